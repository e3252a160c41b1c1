//! Placeholder allocation.
//!
//! Each namespace keeps its own counter, so `:wh0`, `:up0` and `:ins0` can all
//! exist in the same statement without colliding.

use crate::value::Value;
use indexmap::IndexMap;

/// Placeholder name -> bound value, in allocation order.
pub type Bindings = IndexMap<String, Value>;

/// Which clause a value is bound for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Where,
    Update,
    Insert,
}

impl Namespace {
    /// Placeholder prefix, including the leading colon.
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Where => ":wh",
            Namespace::Update => ":up",
            Namespace::Insert => ":ins",
        }
    }
}

/// Named placeholder registry for one statement.
#[derive(Debug, Clone, Default)]
pub struct BindRegistry {
    where_: Bindings,
    update: Bindings,
    insert: Bindings,
}

impl BindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder name.
    pub fn bind(&mut self, namespace: Namespace, value: Value) -> String {
        let slot = self.slot_mut(namespace);
        let name = format!("{}{}", namespace.prefix(), slot.len());
        slot.insert(name.clone(), value);
        name
    }

    /// Look up a bound value by placeholder name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.where_
            .get(name)
            .or_else(|| self.update.get(name))
            .or_else(|| self.insert.get(name))
    }

    /// Every binding: WHERE first, then UPDATE, then INSERT.
    pub fn all(&self) -> Bindings {
        let mut out = Bindings::with_capacity(self.len());
        out.extend(self.where_.iter().map(|(k, v)| (k.clone(), v.clone())));
        out.extend(self.update.iter().map(|(k, v)| (k.clone(), v.clone())));
        out.extend(self.insert.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    pub fn namespace(&self, namespace: Namespace) -> &Bindings {
        match namespace {
            Namespace::Where => &self.where_,
            Namespace::Update => &self.update,
            Namespace::Insert => &self.insert,
        }
    }

    pub fn len(&self) -> usize {
        self.where_.len() + self.update.len() + self.insert.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.where_.clear();
        self.update.clear();
        self.insert.clear();
    }

    fn slot_mut(&mut self, namespace: Namespace) -> &mut Bindings {
        match namespace {
            Namespace::Where => &mut self.where_,
            Namespace::Update => &mut self.update,
            Namespace::Insert => &mut self.insert,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_per_namespace() {
        let mut reg = BindRegistry::new();
        assert_eq!(reg.bind(Namespace::Where, Value::Int(1)), ":wh0");
        assert_eq!(reg.bind(Namespace::Update, Value::Int(2)), ":up0");
        assert_eq!(reg.bind(Namespace::Where, Value::Int(3)), ":wh1");
        assert_eq!(reg.bind(Namespace::Insert, Value::Int(4)), ":ins0");
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn all_orders_where_update_insert() {
        let mut reg = BindRegistry::new();
        reg.bind(Namespace::Insert, Value::from("i"));
        reg.bind(Namespace::Update, Value::from("u"));
        reg.bind(Namespace::Where, Value::from("w"));

        let keys: Vec<_> = reg.all().keys().cloned().collect();
        assert_eq!(keys, vec![":wh0", ":up0", ":ins0"]);
        assert_eq!(reg.get(":up0"), Some(&Value::from("u")));
    }

    #[test]
    fn clear_restarts_counters() {
        let mut reg = BindRegistry::new();
        reg.bind(Namespace::Where, Value::Null);
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.bind(Namespace::Where, Value::Null), ":wh0");
    }
}
