// cvar.rs — console variables
//
// The play code reads its compatibility switches from here at level load.
// LATCH variables only change when latched values are applied, so a value set
// mid-level cannot desync a level already in progress.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::common::com_printf;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        /// Write protected outside of force_set.
        const NOSET = 0x01;
        /// Changes wait for apply_latched.
        const LATCH = 0x02;
    }
}

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub flags: CvarFlags,
    pub modified: bool,
    pub value: f32,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

#[derive(Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Floating-point value of a cvar; 0 when it does not exist.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |v| v.value)
    }

    /// String value of a cvar; "" when it does not exist.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.string.as_str())
    }

    /// Get or create a cvar. An existing cvar keeps its value but gains `flags`.
    pub fn get(&mut self, name: &str, value: &str, flags: CvarFlags) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            latched_string: None,
            flags,
            modified: true,
            value: parse_value(value),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> usize {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => return self.get(name, value, CvarFlags::empty()),
        };
        let var = &mut self.cvar_vars[idx];

        if !force {
            if var.flags.contains(CvarFlags::NOSET) {
                com_printf(&format!("{} is write protected.\n", name));
                return idx;
            }
            if var.flags.contains(CvarFlags::LATCH) {
                if var.latched_string.as_deref() == Some(value)
                    || (var.latched_string.is_none() && var.string == value)
                {
                    return idx;
                }
                com_printf(&format!("{} will be changed for next level.\n", name));
                var.latched_string = Some(value.to_string());
                return idx;
            }
        } else {
            var.latched_string = None;
        }

        if var.string == value {
            return idx;
        }
        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
        idx
    }

    /// Set a cvar value (respects NOSET and LATCH).
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, false)
    }

    pub fn set_value(&mut self, name: &str, value: f32) -> usize {
        let s = if value == value.trunc() {
            format!("{}", value as i64)
        } else {
            format!("{}", value)
        };
        self.set2(name, &s, false)
    }

    /// Set ignoring NOSET and LATCH.
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, true)
    }

    /// Move every latched value into place. Called at level load.
    pub fn apply_latched(&mut self) {
        for var in self.cvar_vars.iter_mut() {
            if let Some(latched) = var.latched_string.take() {
                var.value = parse_value(&latched);
                var.string = latched;
                var.modified = true;
            }
        }
    }
}

// ============================================================
// Process-wide registry
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = parking_lot::const_mutex(None);

/// Run `f` against the registry, creating it on first use.
pub fn with_cvar_ctx<F, R>(f: F) -> R
where
    F: FnOnce(&mut CvarContext) -> R,
{
    let mut guard = CVAR_CTX.lock();
    f(guard.get_or_insert_with(CvarContext::new))
}

pub fn cvar_variable_value(name: &str) -> f32 {
    let guard = CVAR_CTX.lock();
    guard.as_ref().map_or(0.0, |ctx| ctx.variable_value(name))
}
