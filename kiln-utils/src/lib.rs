pub use kiln_derive::VisitStrings;

pub trait VisitStrings {
    fn visit_strings<V: StringVisitor>(&mut self, visitor: &mut V);
}

pub trait StringVisitor {
    fn visit_string(&mut self, value: &mut String);
}

impl VisitStrings for String {
    fn visit_strings<V: StringVisitor>(&mut self, visitor: &mut V) {
        visitor.visit_string(self);
    }
}

impl<T: VisitStrings> VisitStrings for Vec<T> {
    fn visit_strings<V: StringVisitor>(&mut self, visitor: &mut V) {
        for item in self.iter_mut() {
            item.visit_strings(visitor);
        }
    }
}

impl<T: VisitStrings> VisitStrings for Option<T> {
    fn visit_strings<V: StringVisitor>(&mut self, visitor: &mut V) {
        if let Some(inner) = self {
            inner.visit_strings(visitor);
        }
    }
}

impl VisitStrings for bool {
    fn visit_strings<V: StringVisitor>(&mut self, _: &mut V) {}
}

impl VisitStrings for usize {
    fn visit_strings<V: StringVisitor>(&mut self, _: &mut V) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl StringVisitor for Upper {
        fn visit_string(&mut self, value: &mut String) {
            *value = value.to_uppercase();
        }
    }

    #[test]
    fn visits_nested_collections() {
        let mut values = vec![Some("gold".to_string()), None, Some("bfd".to_string())];
        values.visit_strings(&mut Upper);

        assert_eq!(values[0].as_deref(), Some("GOLD"));
        assert_eq!(values[1], None);
        assert_eq!(values[2].as_deref(), Some("BFD"));
    }

    #[test]
    fn scalars_are_left_alone() {
        let mut flag = true;
        let mut count = 3usize;
        flag.visit_strings(&mut Upper);
        count.visit_strings(&mut Upper);

        assert!(flag);
        assert_eq!(count, 3);
    }
}
