// src/sheet/headers.rs

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

/// The three logical columns a shipment sheet must provide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CanonicalField {
    Carrier,
    MasterBl,
    Sci,
}

impl CanonicalField {
    pub const REQUIRED: [CanonicalField; 3] = [
        CanonicalField::Carrier,
        CanonicalField::MasterBl,
        CanonicalField::Sci,
    ];

    /// Column label used in operator-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalField::Carrier => "CARRIER",
            CanonicalField::MasterBl => "Master BL",
            CanonicalField::Sci => "SCI",
        }
    }

    /// Fuzzy match a header label. Carrier wins over Master, Master over SCI.
    pub fn from_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        if upper.contains("CARRIER") {
            Some(CanonicalField::Carrier)
        } else if upper.contains("MASTER") {
            Some(CanonicalField::MasterBl)
        } else if upper.contains("SCI") {
            Some(CanonicalField::Sci)
        } else {
            None
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Make every label unique.
///
/// The first occurrence of a label keeps its text. The n-th repeat gets `_n`
/// appended; if that name is already taken by another label in the row, the
/// counter keeps going until a free name turns up.
pub fn dedup_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let originals: HashSet<&str> = labels.iter().map(|l| l.as_ref()).collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut generated: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(labels.len());

    for label in labels {
        let label = label.as_ref();
        match seen.get_mut(label) {
            None => {
                seen.insert(label, 0);
                out.push(label.to_string());
            }
            Some(count) => {
                let name = loop {
                    *count += 1;
                    let candidate = format!("{}_{}", label, count);
                    if !originals.contains(candidate.as_str()) && !generated.contains(&candidate) {
                        break candidate;
                    }
                };
                generated.insert(name.clone());
                out.push(name);
            }
        }
    }

    out
}

/// Unique labels plus the canonical field (if any) each column carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMap {
    labels: Vec<String>,
    fields: Vec<Option<CanonicalField>>,
}

impl HeaderMap {
    /// Deduplicate `raw` and map the result onto canonical fields.
    ///
    /// A canonical field belongs to the left-most column that matches it;
    /// later matches for an already claimed field stay unmapped.
    pub fn normalize<S: AsRef<str>>(raw: &[S]) -> Self {
        let labels = dedup_labels(raw);
        let mut claimed = HashSet::new();
        let fields = labels
            .iter()
            .map(|label| {
                CanonicalField::from_label(label).filter(|field| claimed.insert(*field))
            })
            .collect();
        Self { labels, fields }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Column index that carries `field`.
    pub fn column_of(&self, field: CanonicalField) -> Option<usize> {
        self.fields.iter().position(|f| *f == Some(field))
    }

    /// Required fields no column maps onto, in `REQUIRED` order.
    pub fn missing(&self) -> Vec<CanonicalField> {
        CanonicalField::REQUIRED
            .into_iter()
            .filter(|f| self.column_of(*f).is_none())
            .collect()
    }
}
