//! Constant records.

use spinel_core::{ModuleId, Value};

/// An entry in a module's constant table.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantRecord {
    owner: ModuleId,
    value: Value,
    private: bool,
    /// The value is a deferred-load descriptor (a feature path), not the
    /// constant's real value.
    autoload: bool,
}

impl ConstantRecord {
    pub fn new(owner: ModuleId, value: Value, private: bool, autoload: bool) -> Self {
        Self {
            owner,
            value,
            private,
            autoload,
        }
    }

    #[inline]
    pub fn owner(&self) -> ModuleId {
        self.owner
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        self.private
    }

    #[inline]
    pub fn is_autoload(&self) -> bool {
        self.autoload
    }

    pub(crate) fn set_private(&mut self, private: bool) {
        self.private = private;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_constant() {
        let c = ConstantRecord::new(ModuleId::from_raw(1), Value::Int(42), false, false);
        assert_eq!(c.value(), &Value::Int(42));
        assert!(!c.is_private());
        assert!(!c.is_autoload());
    }

    #[test]
    fn test_visibility_toggle() {
        let mut c = ConstantRecord::new(ModuleId::from_raw(1), Value::Nil, false, false);
        c.set_private(true);
        assert!(c.is_private());
    }
}
