//! Console variable (CVar) implementation.
//!
//! A CVar is a named, typed configuration value with flags, an optional
//! description, a fixed default and a validity constraint. The stored value
//! is a tagged sum over the five supported types; every type is readable and
//! writable through the full int/float/bool/string conversion matrix.

use std::fmt::{self, Display};

use crate::core::index::CasePolicy;
use crate::error::ConsoleError;
use crate::hooks::SharedBoolStrings;

/// Flags controlling CVar behavior and persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CVarFlags(u32);

impl CVarFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Written since the last config save (internal bookkeeping).
    pub const MODIFIED: Self = Self(1 << 0);

    /// Saved to the config file and restored on the next run.
    pub const PERSISTENT: Self = Self(1 << 1);

    /// Never saved. Mutually exclusive with `PERSISTENT`.
    pub const VOLATILE: Self = Self(1 << 2);

    /// Display only; rejects every write through the public interface.
    pub const READ_ONLY: Self = Self(1 << 3);

    /// Like `READ_ONLY`, but writable from the startup command line.
    pub const INIT_ONLY: Self = Self(1 << 4);

    /// Enforce min/max bounds, the allowed-string set or enum membership.
    pub const RANGE_CHECK: Self = Self(1 << 5);

    /// Created by a `set` command rather than by code.
    pub const USER_DEFINED: Self = Self(1 << 6);

    /// Build from a raw bit pattern (user flag bits included).
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bit pattern.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Check if any flag in `other` is set.
    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Combine two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove flags.
    #[inline]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Check if no flags are set.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for CVarFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for CVarFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// Type category of a CVar, fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CVarKind {
    /// 64-bit signed integer.
    Int,
    /// Boolean.
    Bool,
    /// 64-bit float.
    Float,
    /// Text string, optionally restricted to an allowed set.
    Str,
    /// Integer restricted to a named constant list.
    Enum,
}

impl CVarKind {
    /// Printable type name.
    pub fn as_str(self) -> &'static str {
        match self {
            CVarKind::Int => "int",
            CVarKind::Bool => "bool",
            CVarKind::Float => "float",
            CVarKind::Str => "string",
            CVarKind::Enum => "enum",
        }
    }
}

/// Rendering base for integer-valued CVars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    /// Base 2.
    Binary,
    /// Base 8.
    Octal,
    /// Base 10 (initial formatting).
    #[default]
    Decimal,
    /// Base 16, rendered with a `0x` prefix and uppercase digits.
    Hexadecimal,
}

impl NumberFormat {
    /// Numeric base of this format.
    pub fn base(self) -> u32 {
        match self {
            NumberFormat::Binary => 2,
            NumberFormat::Octal => 8,
            NumberFormat::Decimal => 10,
            NumberFormat::Hexadecimal => 16,
        }
    }
}

/// One named constant of an enum CVar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConst {
    /// Symbolic name.
    pub name: Box<str>,
    /// Integer value.
    pub value: i64,
}

/// Optional per-CVar value completion hook. Receives the partial argument
/// and the output cap; returns the matches (capped) and the total count.
pub type ValueCompletionFn = Box<dyn Fn(&str, usize) -> (Vec<String>, usize)>;

// ========================================================
// Naming rule
// ========================================================

/// Check a string against the CVar naming rules.
///
/// Names follow identifier rules, with multi-word names like `snd.volume`
/// allowed: a dot must be followed by a letter or underscore and can never
/// end the name. Registration status is not checked here.
pub fn is_valid_cvar_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    let Some(&first) = bytes.first() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return false;
    }

    for (i, &c) in bytes.iter().enumerate().skip(1) {
        match c {
            b'.' => match bytes.get(i + 1) {
                Some(&n) if n.is_ascii_alphabetic() || n == b'_' => {}
                _ => return false,
            },
            b'_' if i + 1 == bytes.len() => return false,
            c if c.is_ascii_alphanumeric() || c == b'_' => {}
            _ => return false,
        }
    }
    true
}

// ========================================================
// Number <-> string helpers
// ========================================================

/// Render an integer under a [`NumberFormat`]. Non-decimal bases print the
/// two's-complement `u64` pattern for negative values; only decimal carries
/// a sign.
pub fn int_to_string(value: i64, format: NumberFormat) -> String {
    match format {
        NumberFormat::Decimal => value.to_string(),
        NumberFormat::Hexadecimal => format!("0x{:X}", value as u64),
        NumberFormat::Octal => format!("{:o}", value as u64),
        NumberFormat::Binary => format!("{:b}", value as u64),
    }
}

/// Parse an integer literal: optional sign, `0x`/`0X` hex, else decimal.
/// Hex accepts the full `u64` pattern so negative renderings round-trip.
pub fn parse_int(text: &str) -> Option<i64> {
    let t = text.trim();
    let (negative, rest) = match t.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };

    let value = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()? as i64
    } else {
        rest.parse::<u64>().ok()? as i64
    };

    Some(if negative { value.wrapping_neg() } else { value })
}

/// Parse a non-negative integer rendered by [`int_to_string`] under the
/// given format (the inverse used by the base round-trip tests).
pub fn parse_int_with_format(text: &str, format: NumberFormat) -> Option<i64> {
    let t = text.trim();
    let digits = match format {
        NumberFormat::Hexadecimal => t.strip_prefix("0x").or_else(|| t.strip_prefix("0X"))?,
        _ => t,
    };
    u64::from_str_radix(digits, format.base()).ok().map(|v| v as i64)
}

/// Parse a float literal with the standard Rust parser.
pub fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

/// Trim trailing zeros after the decimal point; a dot left alone at the end
/// is dropped too.
fn trim_trailing_zeros(mut s: String) -> String {
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

/// Render a float with up to eight significant digits, fixed or scientific
/// notation depending on magnitude (printf `%.8g` behavior), trailing zeros
/// trimmed.
pub fn float_to_string(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= 8 {
        let s = format!("{:.7e}", value);
        // Trim zeros in the mantissa: "1.2000000e9" -> "1.2e9".
        match s.split_once('e') {
            Some((mantissa, exp)) => {
                let mantissa = trim_trailing_zeros(mantissa.to_string());
                format!("{mantissa}e{exp}")
            }
            None => s,
        }
    } else {
        let decimals = (7 - exponent).max(0) as usize;
        trim_trailing_zeros(format!("{value:.decimals$}"))
    }
}

// ========================================================
// Value storage
// ========================================================

/// Typed storage: current value, fixed default and the validity constraint.
/// Constraints are only enforced while `RANGE_CHECK` is set.
#[derive(Debug, Clone)]
pub(crate) enum CVarValue {
    Int {
        current: i64,
        default: i64,
        min: i64,
        max: i64,
    },
    Bool {
        current: bool,
        default: bool,
    },
    Float {
        current: f64,
        default: f64,
        min: f64,
        max: f64,
    },
    Str {
        current: String,
        default: String,
        allowed: Vec<String>,
    },
    Enum {
        current: i64,
        default: i64,
        constants: Vec<EnumConst>,
    },
}

/// A registered console variable.
///
/// Created through the registry's `register_*` methods; the name, default
/// and type are fixed for the CVar's lifetime, everything else is mutable.
pub struct CVar {
    name: Box<str>,
    desc: Box<str>,
    flags: CVarFlags,
    format: NumberFormat,
    value: CVarValue,
    completion: Option<ValueCompletionFn>,
    bools: SharedBoolStrings,
    value_case: CasePolicy,
    sink: crate::hooks::ErrorSink,
}

impl CVar {
    pub(crate) fn new(
        name: &str,
        desc: &str,
        flags: CVarFlags,
        value: CVarValue,
        bools: SharedBoolStrings,
        value_case: CasePolicy,
        sink: crate::hooks::ErrorSink,
    ) -> Self {
        if flags.contains(CVarFlags::PERSISTENT) && flags.contains(CVarFlags::VOLATILE) {
            sink.report(format_args!(
                "{name}: 'Persistent' and 'Volatile' flags are mutually exclusive!"
            ));
        }
        Self {
            name: name.into(),
            desc: desc.into(),
            flags,
            format: NumberFormat::Decimal,
            value,
            completion: None,
            bools,
            value_case,
            sink,
        }
    }

    // ----- metadata -----

    /// Variable name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, empty if none was given.
    #[inline]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Type category.
    pub fn kind(&self) -> CVarKind {
        match self.value {
            CVarValue::Int { .. } => CVarKind::Int,
            CVarValue::Bool { .. } => CVarKind::Bool,
            CVarValue::Float { .. } => CVarKind::Float,
            CVarValue::Str { .. } => CVarKind::Str,
            CVarValue::Enum { .. } => CVarKind::Enum,
        }
    }

    /// Current rendering base for integer conversions.
    #[inline]
    pub fn number_format(&self) -> NumberFormat {
        self.format
    }

    /// Change the rendering base for integer conversions.
    pub fn set_number_format(&mut self, format: NumberFormat) {
        self.format = format;
    }

    /// Current flags.
    #[inline]
    pub fn flags(&self) -> CVarFlags {
        self.flags
    }

    /// Replace the flags wholesale.
    pub fn set_flags(&mut self, flags: CVarFlags) {
        self.flags = flags;
    }

    /// Flags as a compact display string (`"M P"` style), `"0"` when empty.
    pub fn flags_string(&self) -> String {
        let mut parts = Vec::new();
        for (flag, letter) in [
            (CVarFlags::MODIFIED, "M"),
            (CVarFlags::PERSISTENT, "P"),
            (CVarFlags::VOLATILE, "V"),
            (CVarFlags::READ_ONLY, "R"),
            (CVarFlags::INIT_ONLY, "I"),
            (CVarFlags::RANGE_CHECK, "C"),
            (CVarFlags::USER_DEFINED, "U"),
        ] {
            if self.flags.contains(flag) {
                parts.push(letter);
            }
        }
        if parts.is_empty() {
            "0".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// Mark as written since the last save.
    pub fn set_modified(&mut self) {
        self.flags |= CVarFlags::MODIFIED;
    }

    /// Clear the modified mark (done after a successful save).
    pub fn clear_modified(&mut self) {
        self.flags = self.flags.difference(CVarFlags::MODIFIED);
    }

    /// Written since the last save?
    pub fn is_modified(&self) -> bool {
        self.flags.contains(CVarFlags::MODIFIED)
    }

    /// Writable through the public interface?
    pub fn is_writable(&self) -> bool {
        !self
            .flags
            .intersects(CVarFlags::READ_ONLY | CVarFlags::INIT_ONLY)
    }

    /// Saved to config files?
    pub fn is_persistent(&self) -> bool {
        self.flags.contains(CVarFlags::PERSISTENT)
    }

    /// Constraint enforcement active?
    pub fn is_range_checked(&self) -> bool {
        self.flags.contains(CVarFlags::RANGE_CHECK)
    }

    /// Install a value completion hook used by Tab completion. When absent,
    /// completion falls back to the allowed-value strings.
    pub fn set_value_completion(&mut self, hook: ValueCompletionFn) {
        self.completion = Some(hook);
    }

    /// Whether a value completion hook is installed.
    pub fn has_value_completion(&self) -> bool {
        self.completion.is_some()
    }

    // ----- reads -----

    /// Value as an integer. Strings that fail to parse report an error and
    /// yield zero.
    pub fn as_int(&self) -> i64 {
        match &self.value {
            CVarValue::Int { current, .. } | CVarValue::Enum { current, .. } => *current,
            CVarValue::Bool { current, .. } => *current as i64,
            CVarValue::Float { current, .. } => *current as i64,
            CVarValue::Str { current, .. } => match parse_int(current) {
                Some(v) => v,
                None => {
                    self.sink.error(ConsoleError::TypeMismatch {
                        name: self.name.to_string(),
                        value: current.clone(),
                    });
                    0
                }
            },
        }
    }

    /// Value as a float. Strings that fail to parse report and yield zero.
    pub fn as_float(&self) -> f64 {
        match &self.value {
            CVarValue::Int { current, .. } | CVarValue::Enum { current, .. } => *current as f64,
            CVarValue::Bool { current, .. } => *current as i64 as f64,
            CVarValue::Float { current, .. } => *current,
            CVarValue::Str { current, .. } => match parse_float(current) {
                Some(v) => v,
                None => {
                    self.sink.error(ConsoleError::TypeMismatch {
                        name: self.name.to_string(),
                        value: current.clone(),
                    });
                    0.0
                }
            },
        }
    }

    /// Value as a boolean. Numeric types are true when nonzero; strings try
    /// the bool-string table first, then a numeric parse.
    pub fn as_bool(&self) -> bool {
        match &self.value {
            CVarValue::Bool { current, .. } => *current,
            CVarValue::Int { current, .. } | CVarValue::Enum { current, .. } => *current != 0,
            CVarValue::Float { current, .. } => (*current as i64) != 0,
            CVarValue::Str { current, .. } => {
                let case = self.value_case;
                if let Some(v) = self.bools.borrow().parse(current, |a, b| case.eq(a, b)) {
                    return v;
                }
                match parse_float(current) {
                    Some(v) => (v as i64) != 0,
                    None => {
                        self.sink.error(ConsoleError::TypeMismatch {
                            name: self.name.to_string(),
                            value: current.clone(),
                        });
                        false
                    }
                }
            }
        }
    }

    /// Value rendered as a string. Always succeeds: integers honor the
    /// number format, booleans use the canonical spelling, enums emit the
    /// constant name when the value is a member.
    pub fn value_string(&self) -> String {
        match &self.value {
            CVarValue::Int { current, .. } => int_to_string(*current, self.format),
            CVarValue::Bool { current, .. } => self.bools.borrow().render(*current).to_string(),
            CVarValue::Float { current, .. } => float_to_string(*current),
            CVarValue::Str { current, .. } => current.clone(),
            CVarValue::Enum {
                current, constants, ..
            } => render_enum(*current, constants, self.format),
        }
    }

    /// Default (reset) value rendered as a string.
    pub fn default_value_string(&self) -> String {
        match &self.value {
            CVarValue::Int { default, .. } => int_to_string(*default, self.format),
            CVarValue::Bool { default, .. } => self.bools.borrow().render(*default).to_string(),
            CVarValue::Float { default, .. } => float_to_string(*default),
            CVarValue::Str { default, .. } => default.clone(),
            CVarValue::Enum {
                default, constants, ..
            } => render_enum(*default, constants, self.format),
        }
    }

    // ----- writes -----

    /// Write from an integer.
    pub fn set_int(&mut self, value: i64) -> Result<(), ConsoleError> {
        self.check_writable()?;
        self.assign_int(value)?;
        self.set_modified();
        Ok(())
    }

    /// Write from a float.
    pub fn set_float(&mut self, value: f64) -> Result<(), ConsoleError> {
        self.check_writable()?;
        self.assign_float(value)?;
        self.set_modified();
        Ok(())
    }

    /// Write from a boolean.
    pub fn set_bool(&mut self, value: bool) -> Result<(), ConsoleError> {
        self.set_int(value as i64)
    }

    /// Write from a string, parsed per the stored type.
    pub fn set_string(&mut self, value: &str) -> Result<(), ConsoleError> {
        self.check_writable()?;
        self.assign_string(value)?;
        self.set_modified();
        Ok(())
    }

    /// Reset to the default value and mark modified.
    pub fn set_default(&mut self) -> Result<(), ConsoleError> {
        self.check_writable()?;
        self.assign_default();
        self.set_modified();
        Ok(())
    }

    /// Privileged string write used by config replay and the startup
    /// command line. Honors the two overrides independently and never sets
    /// the modified flag, so persisted state round-trips cleanly.
    pub(crate) fn set_string_privileged(
        &mut self,
        value: &str,
        allow_read_only: bool,
        allow_init_only: bool,
    ) -> Result<(), ConsoleError> {
        self.check_writable_privileged(allow_read_only, allow_init_only)?;
        self.assign_string(value)
    }

    /// Privileged reset; same override rules as the privileged setter.
    pub(crate) fn set_default_privileged(
        &mut self,
        allow_read_only: bool,
        allow_init_only: bool,
    ) -> Result<(), ConsoleError> {
        self.check_writable_privileged(allow_read_only, allow_init_only)?;
        self.assign_default();
        Ok(())
    }

    fn check_writable(&self) -> Result<(), ConsoleError> {
        if self.is_writable() {
            Ok(())
        } else {
            Err(self.sink.error(ConsoleError::ReadOnly(self.name.to_string())))
        }
    }

    fn check_writable_privileged(
        &self,
        allow_read_only: bool,
        allow_init_only: bool,
    ) -> Result<(), ConsoleError> {
        if self.flags.contains(CVarFlags::READ_ONLY) && !allow_read_only {
            return Err(self.sink.error(ConsoleError::ReadOnly(self.name.to_string())));
        }
        if self.flags.contains(CVarFlags::INIT_ONLY) && !allow_read_only && !allow_init_only {
            return Err(self.sink.error(ConsoleError::ReadOnly(self.name.to_string())));
        }
        Ok(())
    }

    fn range_error(&self, value: String, detail: String) -> ConsoleError {
        self.sink.error(ConsoleError::OutOfRange {
            name: self.name.to_string(),
            value,
            detail,
        })
    }

    fn assign_int(&mut self, new: i64) -> Result<(), ConsoleError> {
        let checked = self.is_range_checked();
        let format = self.format;
        match &self.value {
            CVarValue::Int { min, max, .. } => {
                let (min, max) = (*min, *max);
                if checked {
                    if new < min {
                        let (v, m) = (int_to_string(new, format), int_to_string(min, format));
                        return Err(self.range_error(v, format!("below minimum ({m})")));
                    }
                    if new > max {
                        let (v, m) = (int_to_string(new, format), int_to_string(max, format));
                        return Err(self.range_error(v, format!("above maximum ({m})")));
                    }
                }
                if let CVarValue::Int { current, .. } = &mut self.value {
                    *current = new;
                }
                Ok(())
            }
            CVarValue::Bool { .. } => {
                if let CVarValue::Bool { current, .. } = &mut self.value {
                    *current = new > 0;
                }
                Ok(())
            }
            CVarValue::Float { .. } => self.assign_float_raw(new as f64, checked),
            CVarValue::Str { .. } => {
                let rendered = int_to_string(new, format);
                self.assign_str_raw(rendered, checked)
            }
            CVarValue::Enum { constants, .. } => {
                if checked && !constants.is_empty() && !constants.iter().any(|c| c.value == new) {
                    let v = int_to_string(new, format);
                    return Err(self.range_error(v, "not a member of the enum".to_string()));
                }
                if let CVarValue::Enum { current, .. } = &mut self.value {
                    *current = new;
                }
                Ok(())
            }
        }
    }

    fn assign_float(&mut self, new: f64) -> Result<(), ConsoleError> {
        let checked = self.is_range_checked();
        match &self.value {
            CVarValue::Float { .. } => self.assign_float_raw(new, checked),
            CVarValue::Int { min, max, .. } => {
                let (min, max) = (*min, *max);
                if checked {
                    if new < min as f64 {
                        let m = int_to_string(min, self.format);
                        return Err(
                            self.range_error(float_to_string(new), format!("below minimum ({m})"))
                        );
                    }
                    if new > max as f64 {
                        let m = int_to_string(max, self.format);
                        return Err(
                            self.range_error(float_to_string(new), format!("above maximum ({m})"))
                        );
                    }
                }
                if let CVarValue::Int { current, .. } = &mut self.value {
                    *current = new as i64;
                }
                Ok(())
            }
            CVarValue::Bool { .. } => {
                if let CVarValue::Bool { current, .. } = &mut self.value {
                    *current = new > 0.0;
                }
                Ok(())
            }
            CVarValue::Str { .. } => {
                let rendered = float_to_string(new);
                self.assign_str_raw(rendered, checked)
            }
            CVarValue::Enum { .. } => self.assign_int(new as i64),
        }
    }

    fn assign_float_raw(&mut self, new: f64, checked: bool) -> Result<(), ConsoleError> {
        let CVarValue::Float { min, max, .. } = &self.value else {
            unreachable!("assign_float_raw on non-float");
        };
        let (min, max) = (*min, *max);
        if checked {
            if new < min {
                let m = float_to_string(min);
                return Err(self.range_error(float_to_string(new), format!("below minimum ({m})")));
            }
            if new > max {
                let m = float_to_string(max);
                return Err(self.range_error(float_to_string(new), format!("above maximum ({m})")));
            }
        }
        if let CVarValue::Float { current, .. } = &mut self.value {
            *current = new;
        }
        Ok(())
    }

    fn assign_str_raw(&mut self, new: String, checked: bool) -> Result<(), ConsoleError> {
        let case = self.value_case;
        let CVarValue::Str { allowed, .. } = &self.value else {
            unreachable!("assign_str_raw on non-string");
        };
        if checked && !allowed.is_empty() && !allowed.iter().any(|a| case.eq(a, &new)) {
            return Err(self.range_error(new, "not in the allowed set".to_string()));
        }
        if let CVarValue::Str { current, .. } = &mut self.value {
            *current = new;
        }
        Ok(())
    }

    fn assign_string(&mut self, new: &str) -> Result<(), ConsoleError> {
        let checked = self.is_range_checked();
        let case = self.value_case;
        match &self.value {
            CVarValue::Int { .. } => match parse_int(new) {
                Some(v) => self.assign_int(v),
                None => Err(self.sink.error(ConsoleError::TypeMismatch {
                    name: self.name.to_string(),
                    value: new.to_string(),
                })),
            },
            CVarValue::Float { .. } => match parse_float(new) {
                Some(v) => self.assign_float(v),
                None => Err(self.sink.error(ConsoleError::TypeMismatch {
                    name: self.name.to_string(),
                    value: new.to_string(),
                })),
            },
            CVarValue::Bool { .. } => {
                let parsed = self.bools.borrow().parse(new, |a, b| case.eq(a, b));
                match parsed {
                    Some(v) => {
                        let CVarValue::Bool { current, .. } = &mut self.value else {
                            unreachable!()
                        };
                        *current = v;
                        Ok(())
                    }
                    None => Err(self.sink.error(ConsoleError::TypeMismatch {
                        name: self.name.to_string(),
                        value: new.to_string(),
                    })),
                }
            }
            CVarValue::Str { .. } => self.assign_str_raw(new.to_string(), checked),
            CVarValue::Enum { constants, .. } => {
                // Symbolic constant name first, then a numeric literal.
                if let Some(c) = constants.iter().find(|c| case.eq(&c.name, new)) {
                    let value = c.value;
                    let CVarValue::Enum { current, .. } = &mut self.value else {
                        unreachable!()
                    };
                    *current = value;
                    return Ok(());
                }
                match parse_int(new) {
                    Some(v) => self.assign_int(v),
                    None => Err(self.sink.error(ConsoleError::TypeMismatch {
                        name: self.name.to_string(),
                        value: new.to_string(),
                    })),
                }
            }
        }
    }

    fn assign_default(&mut self) {
        match &mut self.value {
            CVarValue::Int {
                current, default, ..
            }
            | CVarValue::Enum {
                current, default, ..
            } => *current = *default,
            CVarValue::Bool { current, default } => *current = *default,
            CVarValue::Float {
                current, default, ..
            } => *current = *default,
            CVarValue::Str {
                current, default, ..
            } => current.clone_from(default),
        }
    }

    // ----- allowed values / completion -----

    /// Total number of allowed values: 2 for bounded numbers and booleans,
    /// the set/list size for strings and enums (0 when unrestricted).
    pub fn allowed_value_count(&self) -> usize {
        match &self.value {
            CVarValue::Int { .. } | CVarValue::Float { .. } | CVarValue::Bool { .. } => 2,
            CVarValue::Str { allowed, .. } => allowed.len(),
            CVarValue::Enum { constants, .. } => constants.len(),
        }
    }

    /// Allowed values rendered for display: up to `max` strings plus the
    /// total available (which can exceed `max`).
    pub fn allowed_value_strings(&self, max: usize) -> (Vec<String>, usize) {
        let all: Vec<String> = match &self.value {
            CVarValue::Int { min, max: hi, .. } => vec![
                int_to_string(*min, self.format),
                int_to_string(*hi, self.format),
            ],
            CVarValue::Float { min, max: hi, .. } => {
                vec![float_to_string(*min), float_to_string(*hi)]
            }
            CVarValue::Bool { .. } => {
                let bools = self.bools.borrow();
                vec![bools.render(false).to_string(), bools.render(true).to_string()]
            }
            CVarValue::Str { allowed, .. } => allowed.clone(),
            CVarValue::Enum { constants, .. } => {
                constants.iter().map(|c| c.name.to_string()).collect()
            }
        };

        let total = all.len();
        let mut out = all;
        out.truncate(max);
        (out, total)
    }

    /// Value completion for the editor: forwards to the installed hook, or
    /// falls back to the allowed-value strings.
    pub fn value_completion(&self, partial: &str, max: usize) -> (Vec<String>, usize) {
        match &self.completion {
            Some(hook) => hook(partial, max),
            None => self.allowed_value_strings(max),
        }
    }

    // ----- persistence -----

    /// Render this variable as a config-file `set` line. Flags are
    /// materialized only for user-defined variables; string and enum values
    /// are quoted.
    pub fn config_line(&self) -> String {
        let mut flags = Vec::new();
        if self.flags.contains(CVarFlags::USER_DEFINED) {
            for (flag, word) in [
                (CVarFlags::PERSISTENT, "-persistent"),
                (CVarFlags::VOLATILE, "-volatile"),
                (CVarFlags::READ_ONLY, "-readonly"),
                (CVarFlags::INIT_ONLY, "-initonly"),
                (CVarFlags::MODIFIED, "-modified"),
            ] {
                if self.flags.contains(flag) {
                    flags.push(word);
                }
            }
        }

        let value = self.value_string();
        let quoted = matches!(self.kind(), CVarKind::Str | CVarKind::Enum);

        let mut line = String::with_capacity(self.name.len() + value.len() + 16);
        line.push_str("set ");
        line.push_str(&self.name);
        line.push(' ');
        if quoted {
            line.push('"');
            line.push_str(&value);
            line.push('"');
        } else {
            line.push_str(&value);
        }
        for word in flags {
            line.push(' ');
            line.push_str(word);
        }
        line
    }

    /// Deep state comparison used by the round-trip tests: same type,
    /// flags, name, current and default values and number format.
    /// Descriptions are display metadata and are not compared.
    pub fn state_equals(&self, other: &CVar) -> bool {
        self.kind() == other.kind()
            && self.flags == other.flags
            && *self.name == *other.name
            && self.format == other.format
            && self.value_string() == other.value_string()
            && self.default_value_string() == other.default_value_string()
    }
}

fn render_enum(value: i64, constants: &[EnumConst], format: NumberFormat) -> String {
    match constants.iter().find(|c| c.value == value) {
        Some(c) => c.name.to_string(),
        None => int_to_string(value, format),
    }
}

impl Display for CVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" = \"{}\"", self.name, self.value_string())?;
        if !self.desc.is_empty() {
            write!(f, " - {}", self.desc)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CVar")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("value", &self.value_string())
            .field("flags", &self.flags_string())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{BoolStrings, ErrorSink};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn quiet_sink() -> ErrorSink {
        ErrorSink::new(Box::new(|_| {}))
    }

    fn make(value: CVarValue, flags: CVarFlags) -> CVar {
        CVar::new(
            "test",
            "",
            flags,
            value,
            Rc::new(RefCell::new(BoolStrings::default())),
            CasePolicy::Sensitive,
            quiet_sink(),
        )
    }

    fn int_var(value: i64, min: i64, max: i64, flags: CVarFlags) -> CVar {
        make(
            CVarValue::Int {
                current: value,
                default: value,
                min,
                max,
            },
            flags,
        )
    }

    #[test]
    fn test_name_validation() {
        assert!(is_valid_cvar_name("fps"));
        assert!(is_valid_cvar_name("_private"));
        assert!(is_valid_cvar_name("snd.volume"));
        assert!(is_valid_cvar_name("a_b.c_d2"));

        assert!(!is_valid_cvar_name(""));
        assert!(!is_valid_cvar_name("9lives"));
        assert!(!is_valid_cvar_name("has space"));
        assert!(!is_valid_cvar_name("trailing."));
        assert!(!is_valid_cvar_name("dot..dot"));
        assert!(!is_valid_cvar_name("a.9"));
        assert!(!is_valid_cvar_name("trailing_"));
        assert!(!is_valid_cvar_name("da$h"));
    }

    #[test]
    fn test_int_to_string_bases() {
        assert_eq!(int_to_string(255, NumberFormat::Decimal), "255");
        assert_eq!(int_to_string(255, NumberFormat::Hexadecimal), "0xFF");
        assert_eq!(int_to_string(255, NumberFormat::Octal), "377");
        assert_eq!(int_to_string(5, NumberFormat::Binary), "101");
        assert_eq!(int_to_string(-42, NumberFormat::Decimal), "-42");
    }

    #[test]
    fn test_int_round_trip_per_base() {
        for format in [
            NumberFormat::Binary,
            NumberFormat::Octal,
            NumberFormat::Decimal,
            NumberFormat::Hexadecimal,
        ] {
            for value in [0i64, 1, 7, 8, 255, 1033, 65535, i64::MAX] {
                let text = int_to_string(value, format);
                assert_eq!(parse_int_with_format(&text, format), Some(value), "{text}");
            }
        }
        // Decimal additionally handles sign.
        assert_eq!(parse_int("-42"), Some(-42));
        // Hex renderings of negatives round-trip through the u64 pattern.
        let text = int_to_string(-1, NumberFormat::Hexadecimal);
        assert_eq!(parse_int(&text), Some(-1));
    }

    #[test]
    fn test_float_to_string_trims() {
        assert_eq!(float_to_string(0.0), "0");
        assert_eq!(float_to_string(800.0), "800");
        assert_eq!(float_to_string(0.5), "0.5");
        assert_eq!(float_to_string(-12.75), "-12.75");
        assert_eq!(float_to_string(2.25), "2.25");
    }

    #[test]
    fn test_float_round_trip_8_digits() {
        for value in [0.0, 0.5, -12.75, 800.0, 1.0e10, 3.0e-7, 123456.78] {
            let text = float_to_string(value);
            let back = parse_float(&text).unwrap();
            let tolerance = (value.abs() * 1e-7).max(1e-12);
            assert!((back - value).abs() <= tolerance, "{value} -> {text} -> {back}");
        }
    }

    #[test]
    fn test_int_range_enforced() {
        let mut var = int_var(60, 1, 240, CVarFlags::RANGE_CHECK);
        assert!(var.set_int(500).is_err());
        assert_eq!(var.as_int(), 60);
        assert!(var.set_int(0).is_err());
        assert_eq!(var.as_int(), 60);
        assert!(var.set_int(240).is_ok());
        assert_eq!(var.as_int(), 240);
    }

    #[test]
    fn test_range_ignored_without_flag() {
        let mut var = int_var(60, 1, 240, CVarFlags::NONE);
        assert!(var.set_int(500).is_ok());
        assert_eq!(var.as_int(), 500);
    }

    #[test]
    fn test_read_only_rejects_all_writes() {
        let mut var = int_var(1, 0, 0, CVarFlags::READ_ONLY);
        assert!(matches!(var.set_int(2), Err(ConsoleError::ReadOnly(_))));
        assert!(var.set_string("2").is_err());
        assert!(var.set_default().is_err());
        assert_eq!(var.as_int(), 1);
        assert!(!var.is_modified());
    }

    #[test]
    fn test_privileged_write_skips_modified() {
        let mut var = int_var(1, 0, 0, CVarFlags::INIT_ONLY);

        // InitOnly rejected without the override.
        assert!(var.set_string_privileged("2", false, false).is_err());
        // The init-only override is enough; modified stays clear.
        assert!(var.set_string_privileged("2", false, true).is_ok());
        assert_eq!(var.as_int(), 2);
        assert!(!var.is_modified());

        // ReadOnly needs its own override; InitOnly is implied by it.
        let mut var = int_var(1, 0, 0, CVarFlags::READ_ONLY);
        assert!(var.set_string_privileged("3", false, true).is_err());
        assert!(var.set_string_privileged("3", true, false).is_ok());
        assert_eq!(var.as_int(), 3);
    }

    #[test]
    fn test_modified_set_by_public_writes() {
        let mut var = int_var(1, 0, 0, CVarFlags::NONE);
        assert!(!var.is_modified());
        var.set_int(5).unwrap();
        assert!(var.is_modified());

        var.clear_modified();
        var.set_default().unwrap();
        assert!(var.is_modified());
        assert_eq!(var.as_int(), 1);
    }

    #[test]
    fn test_bool_conversions() {
        let mut var = make(
            CVarValue::Bool {
                current: false,
                default: false,
            },
            CVarFlags::NONE,
        );
        assert_eq!(var.value_string(), "false");

        var.set_string("yes").unwrap();
        assert!(var.as_bool());
        assert_eq!(var.value_string(), "true");
        assert_eq!(var.as_int(), 1);

        var.set_string("0").unwrap();
        assert!(!var.as_bool());
        assert!(var.set_string("maybe").is_err());
        assert!(!var.as_bool());
    }

    #[test]
    fn test_string_var_allowed_set() {
        let mut var = make(
            CVarValue::Str {
                current: "low".into(),
                default: "low".into(),
                allowed: vec!["low".into(), "medium".into(), "high".into()],
            },
            CVarFlags::RANGE_CHECK,
        );

        assert!(var.set_string("high").is_ok());
        assert!(var.set_string("ultra").is_err());
        assert_eq!(var.value_string(), "high");

        let (values, total) = var.allowed_value_strings(2);
        assert_eq!(total, 3);
        assert_eq!(values, ["low", "medium"]);
    }

    #[test]
    fn test_string_round_trip_within_allowed_set() {
        let mut var = make(
            CVarValue::Str {
                current: "medium".into(),
                default: "low".into(),
                allowed: vec!["low".into(), "medium".into(), "high".into()],
            },
            CVarFlags::RANGE_CHECK,
        );

        let text = var.value_string();
        var.set_string(&text).unwrap();
        assert_eq!(var.value_string(), text);
    }

    #[test]
    fn test_enum_symbolic_and_numeric() {
        let constants = vec![
            EnumConst {
                name: "cold".into(),
                value: 0,
            },
            EnumConst {
                name: "warm".into(),
                value: 1,
            },
            EnumConst {
                name: "hot".into(),
                value: 2,
            },
        ];
        let mut var = make(
            CVarValue::Enum {
                current: 0,
                default: 0,
                constants,
            },
            CVarFlags::RANGE_CHECK,
        );

        assert_eq!(var.value_string(), "cold");

        var.set_string("warm").unwrap();
        assert_eq!(var.as_int(), 1);

        // Numeric literal also accepted.
        var.set_string("2").unwrap();
        assert_eq!(var.value_string(), "hot");

        // Non-members rejected while range-checked.
        assert!(var.set_string("7").is_err());
        assert!(var.set_string("scalding").is_err());
        assert_eq!(var.value_string(), "hot");
    }

    #[test]
    fn test_enum_falls_back_to_numeric_rendering() {
        let mut var = make(
            CVarValue::Enum {
                current: 5,
                default: 5,
                constants: vec![EnumConst {
                    name: "one".into(),
                    value: 1,
                }],
            },
            CVarFlags::NONE,
        );
        assert_eq!(var.value_string(), "5");
        var.set_number_format(NumberFormat::Hexadecimal);
        assert_eq!(var.value_string(), "0x5");
    }

    #[test]
    fn test_cross_type_numeric_writes() {
        let mut var = make(
            CVarValue::Float {
                current: 1.0,
                default: 1.0,
                min: 0.0,
                max: 10.0,
            },
            CVarFlags::RANGE_CHECK,
        );
        var.set_int(7).unwrap();
        assert_eq!(var.as_float(), 7.0);
        assert!(var.set_int(11).is_err());

        let mut var = int_var(0, -10, 10, CVarFlags::RANGE_CHECK);
        var.set_float(3.9).unwrap();
        assert_eq!(var.as_int(), 3);
        assert!(var.set_float(10.5).is_err());
    }

    #[test]
    fn test_string_parse_failure_keeps_value() {
        let mut var = int_var(42, 0, 0, CVarFlags::NONE);
        assert!(matches!(
            var.set_string("not-a-number"),
            Err(ConsoleError::TypeMismatch { .. })
        ));
        assert_eq!(var.as_int(), 42);
    }

    #[test]
    fn test_number_format_rendering() {
        let mut var = int_var(255, 0, 0, CVarFlags::NONE);
        assert_eq!(var.value_string(), "255");
        var.set_number_format(NumberFormat::Hexadecimal);
        assert_eq!(var.value_string(), "0xFF");
        var.set_number_format(NumberFormat::Binary);
        assert_eq!(var.value_string(), "11111111");
    }

    #[test]
    fn test_config_line_quoting_and_flags() {
        let var = make(
            CVarValue::Str {
                current: "hello world".into(),
                default: "hello world".into(),
                allowed: Vec::new(),
            },
            CVarFlags::NONE,
        );
        assert_eq!(var.config_line(), "set test \"hello world\"");

        let var = int_var(60, 0, 0, CVarFlags::NONE);
        assert_eq!(var.config_line(), "set test 60");

        // User-defined variables materialize their flags.
        let var = int_var(
            60,
            0,
            0,
            CVarFlags::USER_DEFINED | CVarFlags::PERSISTENT | CVarFlags::MODIFIED,
        );
        assert_eq!(var.config_line(), "set test 60 -persistent -modified");
    }

    #[test]
    fn test_flags_string() {
        let var = int_var(0, 0, 0, CVarFlags::NONE);
        assert_eq!(var.flags_string(), "0");

        let var = int_var(0, 0, 0, CVarFlags::PERSISTENT | CVarFlags::RANGE_CHECK);
        assert_eq!(var.flags_string(), "P C");
    }

    #[test]
    fn test_display() {
        let var = CVar::new(
            "speed",
            "movement speed",
            CVarFlags::NONE,
            CVarValue::Int {
                current: 3,
                default: 3,
                min: 0,
                max: 0,
            },
            Rc::new(RefCell::new(BoolStrings::default())),
            CasePolicy::Sensitive,
            quiet_sink(),
        );
        assert_eq!(var.to_string(), "\"speed\" = \"3\" - movement speed");
    }
}
