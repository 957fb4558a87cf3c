//! Layering of configuration values.
//!
//! A layer only overrides the settings it changes from their defaults, so a project file
//! and command line arguments can be stacked on top of each other.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{from_value, to_value, Result, Value};

/// Applies `patch` on top of `base`, keeping every setting `patch` leaves at its default.
#[inline]
pub fn overlay<T>(base: &T, patch: &T) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    overlay_all(base, core::iter::once(patch))
}

/// Applies each patch in order on top of `base`.
#[inline]
pub fn overlay_all<'patch, T, I>(base: &T, patches: I) -> Result<T>
where
    T: Default + Serialize + DeserializeOwned + 'patch,
    I: IntoIterator<Item = &'patch T>,
{
    let defaults = to_value(T::default())?;
    let mut merged = to_value(base)?;
    for patch in patches {
        overlay_value(&mut merged, to_value(patch)?, &defaults, "");
    }
    from_value(merged)
}

/// Overlays `patch` onto `target` in place, comparing leaves against the value at `pointer`
/// in `defaults`.
///
/// Leaves without a default to compare against are left alone.
fn overlay_value(target: &mut Value, patch: Value, defaults: &Value, pointer: &str) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                let pointer = format!("{pointer}/{key}");
                let slot = target.entry(key).or_insert(Value::Null);
                overlay_value(slot, value, defaults, &pointer);
            }
        }
        (target, patch) => {
            if pointer.is_empty() {
                return;
            }
            match defaults.pointer(pointer) {
                Some(default) if patch != *default => *target = patch,
                Some(_) => {}
                None => log::trace!("no default for `{pointer}`, keeping the current value"),
            }
        }
    }
}
