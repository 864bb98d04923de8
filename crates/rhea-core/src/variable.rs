//! Shared variable handles.

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{self, AtomicUsize};

static NEXT_VARIABLE_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug)]
struct VariableData {
    id: usize,
    name: Option<String>,
    value: Cell<f64>,
    editable: Cell<bool>,
}

/// A named, mutable real-valued cell.
///
/// Cloning a `Variable` clones the handle, not the cell: every clone reads and
/// writes the same value. Equality, ordering and hashing follow the identity
/// of the cell, never its value.
#[derive(Clone)]
pub struct Variable(Rc<VariableData>);

impl Variable {
    /// Create an anonymous variable with the given initial value.
    pub fn new(value: f64) -> Self {
        Self::build(None, value)
    }

    /// Create a named variable with the given initial value.
    pub fn named(name: impl Into<String>, value: f64) -> Self {
        Self::build(Some(name.into()), value)
    }

    fn build(name: Option<String>, value: f64) -> Self {
        let id = NEXT_VARIABLE_ID.fetch_add(1, atomic::Ordering::Relaxed);
        Self(Rc::new(VariableData {
            id,
            name,
            value: Cell::new(value),
            editable: Cell::new(false),
        }))
    }

    /// Mark the variable as editable.
    ///
    /// The solver keeps editable variables parametric where it can, so values
    /// assigned with [`Variable::set`] survive the next solve.
    pub fn editable(self) -> Self {
        self.0.editable.set(true);
        self
    }

    pub fn set_editable(&self, editable: bool) {
        self.0.editable.set(editable);
    }

    pub fn is_editable(&self) -> bool {
        self.0.editable.get()
    }

    /// Process-unique identity of the underlying cell.
    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn value(&self) -> f64 {
        self.0.value.get()
    }

    /// Overwrite the current value.
    pub fn set(&self, value: f64) {
        self.0.value.set(value);
    }

    /// Check whether two handles refer to the same cell.
    pub fn same(&self, other: &Variable) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Variable {}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("value", &self.0.value.get())
            .field("editable", &self.0.editable.get())
            .finish()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "v{}", self.0.id),
        }
    }
}
