use insight_core::CompanyId;

use crate::job::AiJob;
use crate::result::{AiError, AiResult};

/// Company scope for execution.
///
/// - `Any`: run jobs for any company (shared service).
/// - `Company`: only accept jobs for the specified company.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompanyScope {
    Any,
    Company(CompanyId),
}

impl CompanyScope {
    pub fn allows(&self, company_id: CompanyId) -> bool {
        match self {
            CompanyScope::Any => true,
            CompanyScope::Company(c) => *c == company_id,
        }
    }
}

/// Scheduler/executor for engine jobs.
pub trait AiScheduler: Send + Sync + 'static {
    fn scope(&self) -> CompanyScope;

    fn run<J: AiJob>(&self, job: J) -> Result<AiResult<J::Output>, AiError> {
        if !self.scope().allows(job.company_id()) {
            return Err(AiError::ScopeViolation(format!(
                "company {} not allowed by scheduler",
                job.company_id()
            )));
        }
        job.run()
    }
}

/// Synchronous scheduler that runs jobs immediately on the calling thread.
#[derive(Debug, Copy, Clone)]
pub struct LocalAiScheduler {
    scope: CompanyScope,
}

impl LocalAiScheduler {
    pub fn new(scope: CompanyScope) -> Self {
        Self { scope }
    }

    pub fn for_company(company_id: CompanyId) -> Self {
        Self::new(CompanyScope::Company(company_id))
    }
}

impl AiScheduler for LocalAiScheduler {
    fn scope(&self) -> CompanyScope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoJob {
        company: CompanyId,
        input: Vec<u32>,
    }

    impl AiJob for EchoJob {
        type Input = Vec<u32>;
        type Output = u32;

        fn company_id(&self) -> CompanyId {
            self.company
        }

        fn input(&self) -> &Self::Input {
            &self.input
        }

        fn run(&self) -> Result<AiResult<u32>, AiError> {
            Ok(AiResult::new(self.input.clone()))
        }
    }

    #[test]
    fn scheduler_rejects_jobs_for_other_companies() {
        let sched = LocalAiScheduler::for_company(CompanyId::new(1));
        let job = EchoJob {
            company: CompanyId::new(2),
            input: vec![1],
        };
        match sched.run(job) {
            Err(AiError::ScopeViolation(_)) => {}
            other => panic!("expected ScopeViolation, got {other:?}"),
        }
    }

    #[test]
    fn any_scope_runs_every_job() {
        let sched = LocalAiScheduler::new(CompanyScope::Any);
        let out = sched
            .run(EchoJob {
                company: CompanyId::new(9),
                input: vec![1, 2],
            })
            .unwrap();
        assert_eq!(out.records, vec![1, 2]);
    }
}
