//! Processor configuration.
//!
//! A [`Config`] is handed to each processor at construction, so separate
//! processors can run side by side with different strictness.

use std::fmt;
use std::str::FromStr;

/// How much runtime self-checking the processor performs.
///
/// Levels are ordered: every check enabled at a lower level stays enabled
/// at the higher ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ValidationLevel {
    /// Trust the incoming program.
    None,
    /// Shape-check the whole program before running it.
    #[default]
    Basic,
    /// Also check type compatibility across values (assignment, call, return).
    Light,
    /// Also re-validate stack bookkeeping after every instruction.
    Full,
}

/// All validation levels, weakest first.
pub const ALL_VALIDATION_LEVELS: [ValidationLevel; 4] = [
    ValidationLevel::None,
    ValidationLevel::Basic,
    ValidationLevel::Light,
    ValidationLevel::Full,
];

impl ValidationLevel {
    /// Returns the lowercase name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            ValidationLevel::None => "none",
            ValidationLevel::Basic => "basic",
            ValidationLevel::Light => "light",
            ValidationLevel::Full => "full",
        }
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValidationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_VALIDATION_LEVELS
            .iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown validation level '{s}'"))
    }
}

/// Per-processor policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// Strictness of runtime checking.
    pub validation: ValidationLevel,
    /// Whether the stack buffer may be reallocated when it fills up.
    pub allow_stack_growth: bool,
}

impl Config {
    /// Configuration with the given validation level and growth disabled.
    pub fn with_validation(validation: ValidationLevel) -> Self {
        Self {
            validation,
            allow_stack_growth: false,
        }
    }

    /// Returns a copy with stack growth enabled or disabled.
    pub fn allow_stack_growth(mut self, allow: bool) -> Self {
        self.allow_stack_growth = allow;
        self
    }

    /// True when checks of the given level are enabled.
    pub fn checks(&self, level: ValidationLevel) -> bool {
        self.validation >= level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_basic_without_growth() {
        let config = Config::default();
        assert_eq!(config.validation, ValidationLevel::Basic);
        assert!(!config.allow_stack_growth);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(ValidationLevel::None < ValidationLevel::Basic);
        assert!(ValidationLevel::Basic < ValidationLevel::Light);
        assert!(ValidationLevel::Light < ValidationLevel::Full);
    }

    #[test]
    fn checks_includes_lower_levels() {
        let config = Config::with_validation(ValidationLevel::Light);
        assert!(config.checks(ValidationLevel::None));
        assert!(config.checks(ValidationLevel::Basic));
        assert!(config.checks(ValidationLevel::Light));
        assert!(!config.checks(ValidationLevel::Full));
    }

    #[test]
    fn parse_names() {
        for &level in &ALL_VALIDATION_LEVELS {
            assert_eq!(level.name().parse::<ValidationLevel>(), Ok(level));
        }
        assert_eq!("FULL".parse::<ValidationLevel>(), Ok(ValidationLevel::Full));
        assert!("paranoid".parse::<ValidationLevel>().is_err());
    }
}
