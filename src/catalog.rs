use crate::models::{ClassInfo, Department, Division};

/// Read-only class/division reference data.
///
/// Injected wherever the pipeline needs to resolve a class id, so tests can
/// substitute a reduced roster. Lookups are pure and never fail: unknown ids
/// resolve to `None`, unknown divisions to an empty list, and callers treat
/// both as "unresolved" rather than an error.
pub trait ClassCatalog: Send + Sync {
    fn resolve_class(&self, class_id: &str) -> Option<&ClassInfo>;
    fn classes_by_division(&self, division: Division) -> Vec<&ClassInfo>;
}

/// The school's full roster, Play Group through 12/Arts.
pub struct SchoolCatalog {
    classes: Vec<ClassInfo>,
}

impl SchoolCatalog {
    pub fn with_classes(classes: Vec<ClassInfo>) -> Self {
        SchoolCatalog { classes }
    }

    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }
}

impl ClassCatalog for SchoolCatalog {
    fn resolve_class(&self, class_id: &str) -> Option<&ClassInfo> {
        self.classes.iter().find(|cls| cls.id == class_id)
    }

    fn classes_by_division(&self, division: Division) -> Vec<&ClassInfo> {
        self.classes
            .iter()
            .filter(|cls| cls.division == division)
            .collect()
    }
}

impl Default for SchoolCatalog {
    fn default() -> Self {
        fn class(
            id: &str,
            name: &str,
            division: Division,
            department: Option<Department>,
        ) -> ClassInfo {
            ClassInfo {
                id: id.to_string(),
                name: name.to_string(),
                division,
                department,
            }
        }

        use Department::{Arts, Commerce, General, Science};
        use Division::{Middle, MiddleGeneral, PreSchool, Primary, Secondary};

        SchoolCatalog {
            classes: vec![
                class("play-group", "Play Group", PreSchool, None),
                class("nursery", "Nursery", PreSchool, None),
                class("jkg-a", "JKG-A", PreSchool, None),
                class("jkg-b", "JKG-B", PreSchool, None),
                class("skg-a", "SKG-A", PreSchool, None),
                class("skg-b", "SKG-B", PreSchool, None),
                class("1-a", "1/A", Primary, Some(General)),
                class("1-b", "1/B", Primary, Some(General)),
                class("2-a", "2/A", Primary, Some(General)),
                class("2-b", "2/B", Primary, Some(General)),
                class("3-a", "3/A", Primary, Some(General)),
                class("4-a", "4/A", Primary, Some(General)),
                class("4-b", "4/B", Primary, Some(General)),
                class("5-a", "5/A", Primary, Some(General)),
                class("5-b", "5/B", Primary, Some(General)),
                class("6-a", "6/A", Middle, Some(General)),
                class("7-a", "7/A", Middle, Some(General)),
                class("8-a", "8/A", Middle, Some(General)),
                class("9-a", "9/A", Middle, Some(General)),
                class("10-a", "10/A", Middle, Some(General)),
                class("6-b", "6/B", MiddleGeneral, Some(General)),
                class("7-b", "7/B", MiddleGeneral, Some(General)),
                class("8-b", "8/B", MiddleGeneral, Some(General)),
                class("9-b", "9/B", MiddleGeneral, Some(General)),
                class("10-b", "10/B", MiddleGeneral, Some(General)),
                class("11-sci", "11/Sci.", Secondary, Some(Science)),
                class("12-sci", "12/Sci.", Secondary, Some(Science)),
                class("11-com", "11/Com.", Secondary, Some(Commerce)),
                class("12-com", "12/Com.", Secondary, Some(Commerce)),
                class("11-arts", "11/Arts", Secondary, Some(Arts)),
                class("12-arts", "12/Arts", Secondary, Some(Arts)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_class() {
        let catalog = SchoolCatalog::default();
        let info = catalog.resolve_class("8-a").unwrap();
        assert_eq!(info.name, "8/A");
        assert_eq!(info.division, Division::Middle);
    }

    #[test]
    fn unknown_class_resolves_to_none() {
        let catalog = SchoolCatalog::default();
        assert!(catalog.resolve_class("13-z").is_none());
    }

    #[test]
    fn middle_division_lists_five_classes() {
        let catalog = SchoolCatalog::default();
        let classes = catalog.classes_by_division(Division::Middle);
        let ids: Vec<&str> = classes.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["6-a", "7-a", "8-a", "9-a", "10-a"]);
    }

    #[test]
    fn reduced_roster_substitutes_for_the_default() {
        let catalog = SchoolCatalog::with_classes(vec![ClassInfo {
            id: "8-a".to_string(),
            name: "8/A".to_string(),
            division: Division::Middle,
            department: None,
        }]);
        assert!(catalog.resolve_class("8-a").is_some());
        assert!(catalog.resolve_class("nursery").is_none());
        assert_eq!(catalog.classes_by_division(Division::Primary).len(), 0);
    }

    #[test]
    fn every_class_id_is_unique() {
        let catalog = SchoolCatalog::default();
        let mut ids: Vec<&str> = catalog.classes().iter().map(|c| c.id.as_str()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }
}
