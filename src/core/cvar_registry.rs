//! CVar registry: registration, lookup, typed get/set by name and the
//! privileged write path used by config replay.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::cvar::{
    is_valid_cvar_name, CVar, CVarFlags, CVarValue, EnumConst, ValueCompletionFn,
};
use crate::core::index::{CasePolicy, NameIndex};
use crate::error::{ConsoleError, DuplicateKind};
use crate::hooks::{BoolStrings, ErrorSink, SharedBoolStrings};

/// Stable handle to a registered CVar.
///
/// Returned by the `register_*` methods. A handle is invalidated by removing
/// that variable; looking up through a stale handle yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CVarId(usize);

/// Keyed store of console variables.
///
/// Name lookups are case-sensitive by default, as are value-string
/// comparisons (allowed sets, bool spellings, enum constant names); both
/// policies are fixed at construction.
pub struct CVarRegistry {
    index: NameIndex<CVar>,
    value_case: CasePolicy,
    bools: SharedBoolStrings,
    sink: ErrorSink,
    allow_writing_read_only: bool,
    allow_writing_init_only: bool,
}

impl Default for CVarRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CVarRegistry {
    /// Registry with the default policies (names and values sensitive) and
    /// the stderr error sink.
    pub fn new() -> Self {
        Self::with_policies(CasePolicy::Sensitive, CasePolicy::Sensitive, ErrorSink::default())
    }

    /// Registry with explicit case policies and error sink.
    pub fn with_policies(name_case: CasePolicy, value_case: CasePolicy, sink: ErrorSink) -> Self {
        Self {
            index: NameIndex::new(name_case),
            value_case,
            bools: Rc::new(RefCell::new(BoolStrings::default())),
            sink,
            allow_writing_read_only: false,
            allow_writing_init_only: false,
        }
    }

    /// The sink this registry reports through.
    pub fn sink(&self) -> &ErrorSink {
        &self.sink
    }

    /// Shared boolean spelling table used by this registry's variables.
    pub fn bool_strings(&self) -> SharedBoolStrings {
        Rc::clone(&self.bools)
    }

    /// Replace the boolean spelling table (empty restores the defaults).
    pub fn set_bool_strings(&self, pairs: &[(&str, &str)]) {
        self.bools.borrow_mut().set(pairs);
    }

    /// Test a string against the CVar naming rules. Registration status is
    /// not checked.
    pub fn is_valid_name(&self, name: &str) -> bool {
        is_valid_cvar_name(name)
    }

    /// Number of registered variables.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when no variables are registered.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ========================================================
    // Registration
    // ========================================================

    fn validate_registration(
        &self,
        name: &str,
        flags: CVarFlags,
        same_value: impl FnOnce(&CVar) -> bool,
    ) -> Result<(), ConsoleError> {
        if !is_valid_cvar_name(name) {
            return Err(self.sink.error(ConsoleError::InvalidName(name.to_string())));
        }
        if let Some(existing) = self.index.get(name) {
            let kind = if existing.flags() != flags {
                DuplicateKind::Flags
            } else if !same_value(existing) {
                DuplicateKind::Value
            } else {
                DuplicateKind::Name
            };
            return Err(self.sink.error(ConsoleError::Duplicate {
                name: name.to_string(),
                kind,
            }));
        }
        Ok(())
    }

    fn link(&mut self, name: &str, desc: &str, flags: CVarFlags, value: CVarValue) -> CVarId {
        let cvar = CVar::new(
            name,
            desc,
            flags,
            value,
            Rc::clone(&self.bools),
            self.value_case,
            self.sink.clone(),
        );
        CVarId(self.index.link(name, cvar))
    }

    /// Register a boolean variable.
    pub fn register_bool(
        &mut self,
        name: &str,
        desc: &str,
        flags: CVarFlags,
        init: bool,
    ) -> Result<CVarId, ConsoleError> {
        self.validate_registration(name, flags, |c| c.as_bool() == init)?;
        Ok(self.link(
            name,
            desc,
            flags,
            CVarValue::Bool {
                current: init,
                default: init,
            },
        ))
    }

    /// Register an integer variable with an inclusive range. The range is
    /// only enforced while `RANGE_CHECK` is set.
    pub fn register_int(
        &mut self,
        name: &str,
        desc: &str,
        flags: CVarFlags,
        init: i64,
        min: i64,
        max: i64,
    ) -> Result<CVarId, ConsoleError> {
        self.validate_registration(name, flags, |c| c.as_int() == init)?;
        Ok(self.link(
            name,
            desc,
            flags,
            CVarValue::Int {
                current: init,
                default: init,
                min,
                max,
            },
        ))
    }

    /// Register a float variable with an inclusive range.
    pub fn register_float(
        &mut self,
        name: &str,
        desc: &str,
        flags: CVarFlags,
        init: f64,
        min: f64,
        max: f64,
    ) -> Result<CVarId, ConsoleError> {
        self.validate_registration(name, flags, |c| c.as_float() == init)?;
        Ok(self.link(
            name,
            desc,
            flags,
            CVarValue::Float {
                current: init,
                default: init,
                min,
                max,
            },
        ))
    }

    /// Register a string variable, optionally restricted to `allowed`.
    pub fn register_string(
        &mut self,
        name: &str,
        desc: &str,
        flags: CVarFlags,
        init: &str,
        allowed: &[&str],
    ) -> Result<CVarId, ConsoleError> {
        self.validate_registration(name, flags, |c| c.value_string() == init)?;
        Ok(self.link(
            name,
            desc,
            flags,
            CVarValue::Str {
                current: init.to_string(),
                default: init.to_string(),
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            },
        ))
    }

    /// Register an enum variable over a named constant list.
    pub fn register_enum(
        &mut self,
        name: &str,
        desc: &str,
        flags: CVarFlags,
        init: i64,
        constants: &[(&str, i64)],
    ) -> Result<CVarId, ConsoleError> {
        self.validate_registration(name, flags, |c| c.as_int() == init)?;
        Ok(self.link(
            name,
            desc,
            flags,
            CVarValue::Enum {
                current: init,
                default: init,
                constants: constants
                    .iter()
                    .map(|&(n, v)| EnumConst {
                        name: n.into(),
                        value: v,
                    })
                    .collect(),
            },
        ))
    }

    // ========================================================
    // Lookup
    // ========================================================

    /// Exact lookup by name.
    pub fn find(&self, name: &str) -> Option<&CVar> {
        self.index.get(name)
    }

    /// Exact lookup by name, mutable.
    pub fn find_mut(&mut self, name: &str) -> Option<&mut CVar> {
        self.index.get_mut(name)
    }

    /// Lookup by registration handle.
    pub fn by_id(&self, id: CVarId) -> Option<&CVar> {
        self.index.try_value(id.0)
    }

    /// Lookup by registration handle, mutable.
    pub fn by_id_mut(&mut self, id: CVarId) -> Option<&mut CVar> {
        self.index.try_value_mut(id.0)
    }

    /// Variables whose name starts with `prefix`: up to `max` results
    /// sorted alphabetically, plus the total match count.
    pub fn find_partial(&self, prefix: &str, max: usize) -> (Vec<&CVar>, usize) {
        let (ids, total) = self.index.find_partial(prefix, max);
        (ids.into_iter().map(|id| self.index.value(id)).collect(), total)
    }

    /// Like [`find_partial`](Self::find_partial), but returning owned names
    /// for display.
    pub fn find_partial_names(&self, prefix: &str, max: usize) -> (Vec<String>, usize) {
        let (ids, total) = self.index.find_partial(prefix, max);
        (
            ids.into_iter()
                .map(|id| self.index.name(id).to_string())
                .collect(),
            total,
        )
    }

    /// Variables whose flags intersect `flags`, sorted, plus the total.
    pub fn find_with_flags(&self, flags: CVarFlags, max: usize) -> (Vec<&CVar>, usize) {
        let (ids, total) = self
            .index
            .find_with_flags(flags.bits(), max, |c| c.flags().bits());
        (ids.into_iter().map(|id| self.index.value(id)).collect(), total)
    }

    /// Walk all variables, most recently registered first.
    pub fn iter(&self) -> impl Iterator<Item = &CVar> {
        self.index.iter().map(|(_, c)| c)
    }

    /// Call `visit` for each variable until it returns `false`.
    pub fn enumerate(&self, mut visit: impl FnMut(&CVar) -> bool) {
        for cvar in self.iter() {
            if !visit(cvar) {
                return;
            }
        }
    }

    // ========================================================
    // Removal
    // ========================================================

    /// Remove a variable by name. Handles pointing at it become stale.
    /// Returns false when no such variable exists.
    pub fn remove(&mut self, name: &str) -> bool {
        if !is_valid_cvar_name(name) {
            self.sink
                .report(format_args!("'{name}' is not a valid CVar name. Nothing to remove."));
            return false;
        }
        self.index.unlink(name).is_some()
    }

    /// Remove every variable. All handles become stale.
    pub fn remove_all(&mut self) {
        self.index.clear();
    }

    // ========================================================
    // Typed access by name
    // ========================================================

    /// Boolean value of a variable; reports and returns false when missing.
    pub fn get_bool(&self, name: &str) -> bool {
        match self.find(name) {
            Some(c) => c.as_bool(),
            None => {
                self.sink.error(ConsoleError::NotFound(name.to_string()));
                false
            }
        }
    }

    /// Integer value of a variable; reports and returns zero when missing.
    pub fn get_int(&self, name: &str) -> i64 {
        match self.find(name) {
            Some(c) => c.as_int(),
            None => {
                self.sink.error(ConsoleError::NotFound(name.to_string()));
                0
            }
        }
    }

    /// Float value of a variable; reports and returns zero when missing.
    pub fn get_float(&self, name: &str) -> f64 {
        match self.find(name) {
            Some(c) => c.as_float(),
            None => {
                self.sink.error(ConsoleError::NotFound(name.to_string()));
                0.0
            }
        }
    }

    /// String value of a variable; reports and returns empty when missing.
    pub fn get_string(&self, name: &str) -> String {
        match self.find(name) {
            Some(c) => c.value_string(),
            None => {
                self.sink.error(ConsoleError::NotFound(name.to_string()));
                String::new()
            }
        }
    }

    /// Set an existing variable or register a new boolean one with an empty
    /// description and the given flags.
    pub fn set_bool(&mut self, name: &str, value: bool, flags: CVarFlags) -> Result<CVarId, ConsoleError> {
        if let Some(id) = self.id_of(name) {
            self.by_id_mut(id).unwrap().set_bool(value)?;
            return Ok(id);
        }
        self.register_bool(name, "", flags, value)
    }

    /// Set an existing variable or register a new integer one.
    pub fn set_int(&mut self, name: &str, value: i64, flags: CVarFlags) -> Result<CVarId, ConsoleError> {
        if let Some(id) = self.id_of(name) {
            self.by_id_mut(id).unwrap().set_int(value)?;
            return Ok(id);
        }
        self.register_int(name, "", flags, value, i64::MIN, i64::MAX)
    }

    /// Set an existing variable or register a new float one.
    pub fn set_float(&mut self, name: &str, value: f64, flags: CVarFlags) -> Result<CVarId, ConsoleError> {
        if let Some(id) = self.id_of(name) {
            self.by_id_mut(id).unwrap().set_float(value)?;
            return Ok(id);
        }
        self.register_float(name, "", flags, value, f64::MIN, f64::MAX)
    }

    /// Set an existing variable or register a new string one.
    pub fn set_string(&mut self, name: &str, value: &str, flags: CVarFlags) -> Result<CVarId, ConsoleError> {
        if let Some(id) = self.id_of(name) {
            self.by_id_mut(id).unwrap().set_string(value)?;
            return Ok(id);
        }
        self.register_string(name, "", flags, value, &[])
    }

    /// Install a value completion hook on a variable.
    pub fn set_value_completion(&mut self, name: &str, hook: ValueCompletionFn) -> bool {
        match self.find_mut(name) {
            Some(c) => {
                c.set_value_completion(hook);
                true
            }
            None => false,
        }
    }

    fn id_of(&self, name: &str) -> Option<CVarId> {
        self.index.id_of(name).map(CVarId)
    }

    // ========================================================
    // Privileged write path
    // ========================================================

    /// Allow the privileged setter to write `ReadOnly` variables.
    /// `InitOnly` variables inherit the setting; the opposite is not true.
    pub fn set_allow_writing_read_only(&mut self, allow: bool) {
        self.allow_writing_read_only = allow;
        self.allow_writing_init_only = allow;
    }

    /// Allow the privileged setter to write `InitOnly` variables only.
    pub fn set_allow_writing_init_only(&mut self, allow: bool) {
        self.allow_writing_init_only = allow;
    }

    /// String write used by the `set` command. While either override window
    /// is open (config replay, startup command line) this takes the
    /// privileged path, which can bypass `ReadOnly`/`InitOnly` per the
    /// overrides and never marks the variable modified.
    pub fn internal_set_string(&mut self, name: &str, value: &str) -> Result<(), ConsoleError> {
        let (allow_ro, allow_init) = (self.allow_writing_read_only, self.allow_writing_init_only);
        let sink = self.sink.clone();
        match self.index.get_mut(name) {
            None => Err(sink.error(ConsoleError::NotFound(name.to_string()))),
            Some(cvar) if allow_ro || allow_init => {
                cvar.set_string_privileged(value, allow_ro, allow_init)
            }
            Some(cvar) => cvar.set_string(value),
        }
    }

    /// Reset used by the `reset` command; same override rules as
    /// [`internal_set_string`](Self::internal_set_string).
    pub fn internal_set_default(&mut self, name: &str) -> Result<(), ConsoleError> {
        let (allow_ro, allow_init) = (self.allow_writing_read_only, self.allow_writing_init_only);
        let sink = self.sink.clone();
        match self.index.get_mut(name) {
            None => Err(sink.error(ConsoleError::NotFound(name.to_string()))),
            Some(cvar) if allow_ro || allow_init => {
                cvar.set_default_privileged(allow_ro, allow_init)
            }
            Some(cvar) => cvar.set_default(),
        }
    }

    /// Clear the modified bit on every variable (after a successful save).
    pub fn clear_all_modified(&mut self) {
        for id in self.index.ids() {
            self.index.value_mut(id).clear_modified();
        }
    }

    /// True when any variable carries the modified bit.
    pub fn any_modified(&self) -> bool {
        self.iter().any(|c| c.is_modified())
    }
}

impl std::fmt::Debug for CVarRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CVarRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cvar::CVarKind;

    fn quiet() -> CVarRegistry {
        CVarRegistry::with_policies(
            CasePolicy::Sensitive,
            CasePolicy::Sensitive,
            ErrorSink::new(Box::new(|_| {})),
        )
    }

    #[test]
    fn test_register_and_find() {
        let mut reg = quiet();
        reg.register_int("fps", "frame cap", CVarFlags::NONE, 60, 1, 240)
            .unwrap();

        let cvar = reg.find("fps").unwrap();
        assert_eq!(cvar.as_int(), 60);
        assert_eq!(cvar.desc(), "frame cap");
        assert_eq!(cvar.kind(), CVarKind::Int);
        assert!(reg.find("FPS").is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_register_rejects_invalid_name() {
        let mut reg = quiet();
        assert!(matches!(
            reg.register_bool("9bad", "", CVarFlags::NONE, false),
            Err(ConsoleError::InvalidName(_))
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_duplicate_diagnostics() {
        let mut reg = quiet();
        reg.register_int("fps", "", CVarFlags::NONE, 60, 0, 0).unwrap();

        let err = reg
            .register_int("fps", "", CVarFlags::PERSISTENT, 60, 0, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::Duplicate {
                kind: DuplicateKind::Flags,
                ..
            }
        ));

        let err = reg.register_int("fps", "", CVarFlags::NONE, 61, 0, 0).unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::Duplicate {
                kind: DuplicateKind::Value,
                ..
            }
        ));

        let err = reg.register_int("fps", "", CVarFlags::NONE, 60, 0, 0).unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::Duplicate {
                kind: DuplicateKind::Name,
                ..
            }
        ));
    }

    #[test]
    fn test_remove_invalidates_lookup() {
        let mut reg = quiet();
        let id = reg.register_bool("ghost", "", CVarFlags::NONE, true).unwrap();

        assert!(reg.remove("ghost"));
        assert!(reg.find("ghost").is_none());
        assert!(reg.by_id(id).is_none());
        assert!(!reg.remove("ghost"));
        assert_eq!(reg.iter().count(), 0);
    }

    #[test]
    fn test_get_missing_reports_default() {
        let reg = quiet();
        assert_eq!(reg.get_int("nope"), 0);
        assert_eq!(reg.get_float("nope"), 0.0);
        assert!(!reg.get_bool("nope"));
        assert_eq!(reg.get_string("nope"), "");
    }

    #[test]
    fn test_set_auto_registers() {
        let mut reg = quiet();
        let id = reg
            .set_string("user.tag", "ace", CVarFlags::USER_DEFINED)
            .unwrap();

        let cvar = reg.by_id(id).unwrap();
        assert_eq!(cvar.value_string(), "ace");
        assert_eq!(cvar.desc(), "");
        assert!(cvar.flags().contains(CVarFlags::USER_DEFINED));

        // Second set updates in place.
        reg.set_string("user.tag", "bee", CVarFlags::NONE).unwrap();
        assert_eq!(reg.get_string("user.tag"), "bee");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_find_partial_sorted_and_counted() {
        let mut reg = quiet();
        for name in ["snd_rate", "snd_music", "snd_volume", "cl_fov"] {
            reg.register_int(name, "", CVarFlags::NONE, 0, 0, 0).unwrap();
        }

        let (names, total) = reg.find_partial_names("snd_", 2);
        assert_eq!(total, 3);
        assert_eq!(names, ["snd_music", "snd_rate"]);
    }

    #[test]
    fn test_find_with_flags() {
        let mut reg = quiet();
        reg.register_int("a", "", CVarFlags::PERSISTENT, 0, 0, 0).unwrap();
        reg.register_int("b", "", CVarFlags::NONE, 0, 0, 0).unwrap();
        reg.register_int("c", "", CVarFlags::PERSISTENT | CVarFlags::READ_ONLY, 0, 0, 0)
            .unwrap();

        let (matches, total) = reg.find_with_flags(CVarFlags::PERSISTENT, 8);
        assert_eq!(total, 2);
        let names: Vec<&str> = matches.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn test_enumeration_stops_on_false() {
        let mut reg = quiet();
        for name in ["a", "b", "c"] {
            reg.register_int(name, "", CVarFlags::NONE, 0, 0, 0).unwrap();
        }

        let mut seen = 0;
        reg.enumerate(|_| {
            seen += 1;
            seen < 2
        });
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_internal_set_respects_override_windows() {
        let mut reg = quiet();
        reg.register_string("boot.mode", "", CVarFlags::INIT_ONLY, "cold", &[])
            .unwrap();

        // Without a window: InitOnly behaves as read-only.
        assert!(matches!(
            reg.internal_set_string("boot.mode", "warm"),
            Err(ConsoleError::ReadOnly(_))
        ));

        // Inside the init-only window: write lands, modified stays clear.
        reg.set_allow_writing_init_only(true);
        reg.internal_set_string("boot.mode", "warm").unwrap();
        reg.set_allow_writing_init_only(false);

        let cvar = reg.find("boot.mode").unwrap();
        assert_eq!(cvar.value_string(), "warm");
        assert!(!cvar.is_modified());

        // Back outside the window: rejected again, value keeps.
        assert!(reg.internal_set_string("boot.mode", "hot").is_err());
        assert_eq!(reg.get_string("boot.mode"), "warm");
    }

    #[test]
    fn test_internal_set_is_unprivileged_outside_windows() {
        let mut reg = quiet();
        reg.register_int("fps", "", CVarFlags::NONE, 60, 0, 0).unwrap();

        reg.internal_set_string("fps", "120").unwrap();
        let cvar = reg.find("fps").unwrap();
        assert_eq!(cvar.as_int(), 120);
        assert!(cvar.is_modified());
    }

    #[test]
    fn test_read_only_window_implies_init_only() {
        let mut reg = quiet();
        reg.register_int("locked", "", CVarFlags::READ_ONLY, 1, 0, 0).unwrap();
        reg.register_int("boot", "", CVarFlags::INIT_ONLY, 1, 0, 0).unwrap();

        reg.set_allow_writing_read_only(true);
        reg.internal_set_string("locked", "2").unwrap();
        reg.internal_set_string("boot", "2").unwrap();
        reg.set_allow_writing_read_only(false);

        assert_eq!(reg.get_int("locked"), 2);
        assert_eq!(reg.get_int("boot"), 2);
    }

    #[test]
    fn test_clear_all_modified() {
        let mut reg = quiet();
        reg.register_int("a", "", CVarFlags::NONE, 0, 0, 0).unwrap();
        reg.register_int("b", "", CVarFlags::NONE, 0, 0, 0).unwrap();

        reg.find_mut("a").unwrap().set_int(1).unwrap();
        reg.find_mut("b").unwrap().set_int(2).unwrap();
        assert!(reg.any_modified());

        reg.clear_all_modified();
        assert!(!reg.any_modified());
    }

    #[test]
    fn test_case_insensitive_names_when_configured() {
        let mut reg = CVarRegistry::with_policies(
            CasePolicy::Insensitive,
            CasePolicy::Sensitive,
            ErrorSink::new(Box::new(|_| {})),
        );
        reg.register_int("MaxFps", "", CVarFlags::NONE, 60, 0, 0).unwrap();
        assert!(reg.find("maxfps").is_some());
        assert!(reg.register_int("MAXFPS", "", CVarFlags::NONE, 60, 0, 0).is_err());
    }
}
