use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct AdCreative {
    pub copy_text: String,
    pub media_url: String,
    pub headline: String,
    pub destination_url: String,
}

/// One discovered business, keyed by name. The optional fields fill in as
/// the pipeline stages succeed for it.
#[derive(Debug, Clone)]
pub struct Listing {
    pub name: String,
    pub website: String,
    pub address: Option<String>,
    pub distance_miles: f64,
    pub social_link: Option<String>,
    pub page_id: Option<String>,
    pub ads: Option<Vec<AdCreative>>,
}

impl Listing {
    pub fn new(name: String, website: String, address: Option<String>, distance_miles: f64) -> Self {
        Listing {
            name,
            website,
            address,
            distance_miles,
            social_link: None,
            page_id: None,
            ads: None,
        }
    }
}

/// Insertion-ordered set of listings, keyed by name. Lives for a single
/// pipeline run; stages after discovery only shrink it.
#[derive(Debug, Default)]
pub struct WorkingSet {
    entries: Vec<Listing>,
    names: HashSet<String>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns false without touching the set when the name is already taken.
    pub fn insert(&mut self, listing: Listing) -> bool {
        if !self.names.insert(listing.name.clone()) {
            return false;
        }
        self.entries.push(listing);
        true
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Listing> {
        self.entries.iter_mut().find(|listing| listing.name == name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        if !self.names.remove(name) {
            return false;
        }
        self.entries.retain(|listing| listing.name != name);
        true
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Listing) -> bool,
    {
        let names = &mut self.names;
        self.entries.retain(|listing| {
            let keeping = keep(listing);
            if !keeping {
                names.remove(&listing.name);
            }
            keeping
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listing> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{Listing, WorkingSet};

    fn listing(name: &str) -> Listing {
        Listing::new(name.to_string(), format!("https://{}.com", name), None, 1.0)
    }

    #[test]
    fn insert_rejects_duplicate_names() {
        let mut listings = WorkingSet::new();
        assert!(listings.insert(listing("acme")));
        assert!(!listings.insert(listing("acme")));
        assert_eq!(listings.len(), 1);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut listings = WorkingSet::new();
        listings.insert(listing("cobra"));
        listings.insert(listing("acme"));
        listings.insert(listing("bravo"));

        let names: Vec<&str> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["cobra", "acme", "bravo"]);
    }

    #[test]
    fn remove_frees_the_name() {
        let mut listings = WorkingSet::new();
        listings.insert(listing("acme"));
        assert!(listings.remove("acme"));
        assert!(!listings.remove("acme"));
        assert!(!listings.contains("acme"));
        assert!(listings.insert(listing("acme")));
    }

    #[test]
    fn retain_drops_names_with_entries() {
        let mut listings = WorkingSet::new();
        listings.insert(listing("acme"));
        listings.insert(listing("bravo"));
        listings.retain(|l| l.name == "bravo");

        assert_eq!(listings.len(), 1);
        assert!(!listings.contains("acme"));
        assert!(listings.contains("bravo"));
    }
}
