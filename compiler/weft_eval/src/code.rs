//! `Code`: an evaluable closure over `(Session, Environment)` (spec §3,
//! §4.6), plus the textual plan `describe()` the test suite inspects
//! (spec §4.6 "Every `Code` exposes a `describe()`").

use crate::env::Environment;
use crate::error::EvalError;
use crate::session::Session;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

type RunFn = dyn Fn(&mut Session, &Environment) -> Result<Value, EvalError>;

#[derive(Clone)]
pub struct Code {
    run: Rc<RunFn>,
    plan: Rc<str>,
}

impl Code {
    pub fn new(plan: impl Into<Rc<str>>, run: impl Fn(&mut Session, &Environment) -> Result<Value, EvalError> + 'static) -> Self {
        Code { run: Rc::new(run), plan: plan.into() }
    }

    pub fn run(&self, session: &mut Session, env: &Environment) -> Result<Value, EvalError> {
        (self.run)(session, env)
    }

    #[must_use]
    pub fn describe(&self) -> &str {
        &self.plan
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({})", self.plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[test]
    fn describe_returns_the_plan_it_was_built_with() {
        let code = Code::new("literal 1", |_s, _env| Ok(Value::Int(1)));
        assert_eq!(code.describe(), "literal 1");
    }

    #[test]
    fn run_invokes_the_closure_against_the_given_session_and_environment() {
        let code = Code::new("literal 1", |_s, _env| Ok(Value::Int(1)));
        let mut session = Session::new();
        let env = session.env().clone();
        assert!(matches!(code.run(&mut session, &env), Ok(Value::Int(1))));
    }

    #[test]
    fn cloning_code_shares_the_same_underlying_closure() {
        let code = Code::new("literal 1", |_s, _env| Ok(Value::Int(1)));
        let cloned = code.clone();
        assert_eq!(code.describe(), cloned.describe());
    }
}
