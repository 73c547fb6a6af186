use super::OverrideRecord;

/// The result of one poll: an ordered, immutable record list.
///
/// Replaced wholesale on every change, never mutated in place, so a reader
/// holding one always sees a complete poll result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideGeneration {
    records: Vec<OverrideRecord>,
}

impl OverrideGeneration {
    pub fn new(records: Vec<OverrideRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[OverrideRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First enabled record, in table order, that covers `key`.
    ///
    /// Disabled records are treated as absent.
    pub fn find(
        &self,
        key: &str,
    ) -> Option<&OverrideRecord> {
        self.records.iter().find(|r| r.is_enabled() && r.matches(key))
    }

    /// Element-wise equality with a freshly polled list
    pub fn same_records(
        &self,
        polled: &[OverrideRecord],
    ) -> bool {
        self.records.as_slice() == polled
    }

    /// Records of this generation that `polled` removed or re-versioned
    pub fn changed_records(
        &self,
        polled: &[OverrideRecord],
    ) -> Vec<OverrideRecord> {
        self.records
            .iter()
            .filter(|old| match polled.iter().find(|new| new.cache_key == old.cache_key) {
                Some(new) => new.value_version != old.value_version,
                None => true,
            })
            .cloned()
            .collect()
    }
}
