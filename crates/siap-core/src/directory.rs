//! Read-only school directory with substring search.

use crate::model::School;

/// Schools available to an inspector.
#[derive(Debug, Clone, Default)]
pub struct SchoolDirectory {
    schools: Vec<School>,
}

impl SchoolDirectory {
    pub fn new(schools: Vec<School>) -> Self {
        Self { schools }
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }

    pub fn all(&self) -> &[School] {
        &self.schools
    }

    pub fn get(&self, id: &str) -> Option<&School> {
        self.schools.iter().find(|s| s.id == id)
    }

    /// Schools whose name or NPSN contains `term`, ignoring case.
    /// An empty term matches everything.
    pub fn search(&self, term: &str) -> Vec<&School> {
        let needle = term.trim().to_lowercase();
        self.schools
            .iter()
            .filter(|s| {
                needle.is_empty()
                    || s.name.to_lowercase().contains(&needle)
                    || s.npsn.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Schools assigned to the given inspector.
    pub fn assigned_to(&self, inspector_id: &str) -> Vec<&School> {
        self.schools
            .iter()
            .filter(|s| s.inspector_id == inspector_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school(id: &str, npsn: &str, name: &str, inspector: &str) -> School {
        School {
            id: id.into(),
            npsn: npsn.into(),
            name: name.into(),
            principal: "Kepala".into(),
            inspector_id: inspector.into(),
            latitude: None,
            longitude: None,
        }
    }

    fn directory() -> SchoolDirectory {
        SchoolDirectory::new(vec![
            school("S1", "20100001", "SDN 1 Menteng", "P01"),
            school("S2", "20100002", "SMPN 3 Gambir", "P01"),
            school("S3", "20200417", "SDN 2 Menteng", "P02"),
        ])
    }

    #[test]
    fn search_by_name_ignores_case() {
        let d = directory();
        let ids: Vec<_> = d.search("menteng").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["S1", "S3"]);
    }

    #[test]
    fn search_by_npsn_substring() {
        let d = directory();
        let ids: Vec<_> = d.search("0417").iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["S3"]);
    }

    #[test]
    fn empty_term_matches_all() {
        assert_eq!(directory().search("  ").len(), 3);
    }

    #[test]
    fn filter_by_inspector() {
        let d = directory();
        assert_eq!(d.assigned_to("P01").len(), 2);
        assert!(d.get("S2").is_some());
        assert!(d.get("S9").is_none());
    }
}
