//! Item-to-plan name derivation.
//!
//! An item and its plan are linked only by this naming rule: the plan key is
//! the item name with `_plan` inserted before the extension.

pub const PLAN_SUFFIX: &str = "_plan";

/// Split `name` into `(stem, extension)` where the extension keeps its dot.
///
/// Names without an extension, or whose only dot is the leading one, have an
/// empty extension.
fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Derive the plan key for an item (`A.md` -> `A_plan.md`).
pub fn plan_key(item_name: &str) -> String {
    let (stem, ext) = split_name(item_name);
    format!("{stem}{PLAN_SUFFIX}{ext}")
}

/// Recover the item name a plan key was derived from (`A_plan.md` -> `A.md`).
///
/// Returns `None` when `plan_key` does not carry the plan suffix.
pub fn item_name_for_plan(plan_key: &str) -> Option<String> {
    let (stem, ext) = split_name(plan_key);
    let item_stem = stem.strip_suffix(PLAN_SUFFIX)?;
    if item_stem.is_empty() {
        return None;
    }
    Some(format!("{item_stem}{ext}"))
}

/// True when `name` ends with `.{extension}` (case-insensitive).
pub fn has_extension(name: &str, extension: &str) -> bool {
    let (_, ext) = split_name(name);
    ext.strip_prefix('.')
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// True when `name` looks like a plan key with the given extension.
pub fn is_plan_key(name: &str, extension: &str) -> bool {
    has_extension(name, extension) && item_name_for_plan(name).is_some()
}
