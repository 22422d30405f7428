use std::collections::BTreeSet;

/// Bit set des matériaux tramés, un bit par index de matériau, packé en mots 32 bits.
///
/// Les matériaux absents de la whitelist passent par un alpha test.
///
/// # Example
/// ```
/// use sd_core::whitelist::MaterialWhitelist;
/// let names = ["Glass", "Leaves"].iter().map(|s| s.to_string()).collect();
/// let (wl, any) = MaterialWhitelist::build(&names, ["Stone", "Leaves", "Glass"].iter().copied());
/// assert!(any);
/// assert!(!wl.contains(0));
/// assert!(wl.contains(1));
/// assert_eq!(wl.words(), &[0b110]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialWhitelist {
    words: Vec<u32>,
    material_count: u32,
}

impl MaterialWhitelist {
    /// Pack the whitelist for the scene's materials, in material index order.
    ///
    /// Returns the packed set and whether at least one material matched.
    pub fn build<'a, I>(names: &BTreeSet<String>, materials: I) -> (Self, bool)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut words = Vec::new();
        let mut material_count = 0u32;
        let mut any = false;

        for (mat, name) in materials.into_iter().enumerate() {
            let word = mat / 32;
            if word >= words.len() {
                words.push(0);
            }
            if names.contains(name) {
                words[word] |= 1 << (mat % 32);
                any = true;
            }
            material_count += 1;
        }

        (
            Self {
                words,
                material_count,
            },
            any,
        )
    }

    /// Wrap already packed words.
    #[must_use]
    pub fn from_words(words: Vec<u32>, material_count: u32) -> Self {
        Self {
            words,
            material_count,
        }
    }

    /// `true` if the material index is whitelisted. Out-of-range indices are not.
    #[inline(always)]
    #[must_use]
    pub fn contains(&self, material_id: u32) -> bool {
        self.words
            .get((material_id / 32) as usize)
            .is_some_and(|w| w & (1 << (material_id % 32)) != 0)
    }

    /// Packed words, `ceil(material_count / 32)` of them.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Number of materials the set was built for.
    #[must_use]
    pub fn material_count(&self) -> u32 {
        self.material_count
    }
}

/// Split the comma-separated property form, dropping empty entries.
#[must_use]
pub fn split_names(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Join names into the comma-separated property form (trailing comma included).
#[must_use]
pub fn join_names<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    names.into_iter().fold(String::new(), |mut acc, n| {
        acc.push_str(n);
        acc.push(',');
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn word_count_rounds_up() {
        let materials: Vec<String> = (0..33).map(|i| format!("m{i}")).collect();
        let (wl, any) = MaterialWhitelist::build(&set(&["m32"]), materials.iter().map(String::as_str));
        assert!(any);
        assert_eq!(wl.words().len(), 2);
        assert_eq!(wl.words()[1], 1);
        assert!(wl.contains(32));
        assert!(!wl.contains(31));
    }

    #[test]
    fn no_match_reports_none() {
        let (wl, any) = MaterialWhitelist::build(&set(&["Glass"]), ["Stone"].iter().copied());
        assert!(!any);
        assert_eq!(wl.words(), &[0]);
        assert_eq!(wl.material_count(), 1);
    }

    #[test]
    fn out_of_range_material_is_not_whitelisted() {
        let wl = MaterialWhitelist::from_words(vec![u32::MAX], 32);
        assert!(wl.contains(31));
        assert!(!wl.contains(64));
    }

    #[test]
    fn property_string_round_trip() {
        let names = set(&["Glass", "Leaves"]);
        let joined = join_names(&names);
        assert_eq!(joined, "Glass,Leaves,");
        assert_eq!(split_names(&joined), vec!["Glass", "Leaves"]);
    }
}
