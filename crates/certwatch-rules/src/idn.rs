//! Internationalized-domain expansion.
//!
//! Homoglyph rules may be written in Unicode while certificates carry
//! ACE-encoded (`xn--`) names, or the other way around. Expanding every
//! input domain with both forms lets the automaton match either spelling.

/// Expand each domain with its Punycode-ASCII and Unicode forms.
///
/// The original domain always survives; converted forms are appended only
/// when distinct. Conversion failures are skipped silently. Order is
/// insertion order with duplicates removed.
pub fn expand(domains: &[String]) -> Vec<String> {
    let mut expanded = Vec::with_capacity(domains.len() * 2);
    let mut push = |candidate: String, out: &mut Vec<String>| {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    for domain in domains {
        push(domain.clone(), &mut expanded);

        if let Ok(ascii) = idna::domain_to_ascii(domain) {
            if ascii != *domain {
                push(ascii, &mut expanded);
            }
        }

        let (unicode, result) = idna::domain_to_unicode(domain);
        if result.is_ok() && unicode != *domain {
            push(unicode, &mut expanded);
        }
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_strs(domains: &[&str]) -> Vec<String> {
        expand(&domains.iter().map(|d| d.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn ascii_domain_passes_through() {
        assert_eq!(expand_strs(&["example.com"]), vec!["example.com"]);
    }

    #[test]
    fn unicode_domain_gains_ace_form() {
        let out = expand_strs(&["münster.example"]);
        assert!(out.contains(&"münster.example".to_string()));
        assert!(out.contains(&"xn--mnster-3ya.example".to_string()));
    }

    #[test]
    fn ace_domain_gains_unicode_form() {
        let out = expand_strs(&["xn--mnster-3ya.example"]);
        assert!(out.contains(&"xn--mnster-3ya.example".to_string()));
        assert!(out.contains(&"münster.example".to_string()));
    }

    #[test]
    fn duplicates_are_removed_in_insertion_order() {
        let out = expand_strs(&["a.example", "a.example", "b.example"]);
        assert_eq!(out, vec!["a.example", "b.example"]);
    }

    #[test]
    fn malformed_punycode_keeps_original() {
        // The bogus ACE label converts to nothing useful; whatever the
        // conversions do, the original must survive in first position.
        let out = expand_strs(&["xn--a-ecp.example"]);
        assert_eq!(out[0], "xn--a-ecp.example");
    }
}
