//! Given/When/Then helpers for ingestion scenarios.
//!
//! The scenario context is a caller-defined type, so steps work with real
//! ledgers and managers instead of string maps.

/// Step definition types for BDD scenarios
pub type GivenStep<C> = fn(&mut C);
pub type WhenStep<C> = fn(&mut C) -> Result<(), String>;
pub type ThenStep<C> = fn(&C) -> Result<(), String>;

/// A BDD scenario with named steps
pub struct Scenario<C> {
    pub name: String,
    pub given_steps: Vec<(&'static str, GivenStep<C>)>,
    pub when_steps: Vec<(&'static str, WhenStep<C>)>,
    pub then_steps: Vec<(&'static str, ThenStep<C>)>,
}

impl<C: Default> Scenario<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            given_steps: Vec::new(),
            when_steps: Vec::new(),
            then_steps: Vec::new(),
        }
    }

    pub fn given(mut self, description: &'static str, step: GivenStep<C>) -> Self {
        self.given_steps.push((description, step));
        self
    }

    pub fn when(mut self, description: &'static str, step: WhenStep<C>) -> Self {
        self.when_steps.push((description, step));
        self
    }

    pub fn then(mut self, description: &'static str, step: ThenStep<C>) -> Self {
        self.then_steps.push((description, step));
        self
    }

    /// Run against a fresh `C::default()`.
    pub fn run(&self) -> Result<(), String> {
        self.run_with(C::default()).map(|_| ())
    }

    /// Run against `ctx` and hand it back for further inspection.
    pub fn run_with(&self, mut ctx: C) -> Result<C, String> {
        eprintln!("Scenario: {}", self.name);

        for (desc, step) in &self.given_steps {
            eprintln!("  Given: {}", desc);
            step(&mut ctx);
        }

        for (desc, step) in &self.when_steps {
            eprintln!("  When: {}", desc);
            step(&mut ctx).map_err(|e| format!("{}: when {}: {}", self.name, desc, e))?;
        }

        for (desc, step) in &self.then_steps {
            eprintln!("  Then: {}", desc);
            step(&ctx).map_err(|e| format!("{}: then {}: {}", self.name, desc, e))?;
        }

        Ok(ctx)
    }
}

/// Assertion helpers for BDD scenarios
pub mod assertions {
    use std::fmt::Debug;

    pub fn assert_present<T: Debug>(option: Option<T>, name: &str) -> Result<T, String> {
        option.ok_or_else(|| format!("Expected {} to be present, but was None", name))
    }

    pub fn assert_eq<T: Debug + PartialEq>(
        actual: T,
        expected: T,
        name: &str,
    ) -> Result<(), String> {
        if actual != expected {
            Err(format!(
                "Expected {} to be {:?}, but was {:?}",
                name, expected, actual
            ))
        } else {
            Ok(())
        }
    }

    pub fn assert_true(flag: bool, name: &str) -> Result<(), String> {
        if !flag {
            Err(format!("Expected {} to be true, but was false", name))
        } else {
            Ok(())
        }
    }

    pub fn assert_ends_with(haystack: &str, suffix: &str, name: &str) -> Result<(), String> {
        if !haystack.ends_with(suffix) {
            Err(format!(
                "Expected {} to end with {:?}. Content: {:?}",
                name, suffix, haystack
            ))
        } else {
            Ok(())
        }
    }

    pub fn assert_contains(haystack: &str, needle: &str, name: &str) -> Result<(), String> {
        if !haystack.contains(needle) {
            Err(format!(
                "Expected {} to contain '{}', but it did not. Content: {}",
                name, needle, haystack
            ))
        } else {
            Ok(())
        }
    }
}
