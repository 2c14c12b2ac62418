//! Property-based tests for URL parsing.
//!
//! Uses proptest to verify the parser is total on arbitrary input and that
//! display/parse reach a fixed point on well-formed URLs.

use proptest::prelude::*;
use vfskit::url::Query;
use vfskit::Url;

/// Strategies for generating URL-shaped input
mod strategies {
    use proptest::prelude::*;

    pub fn scheme() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z][a-z0-9+.-]{0,8}").unwrap()
    }

    pub fn host() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z][a-z0-9.-]{0,15}").unwrap()
    }

    /// Path segments that survive dirname/filename/extension decomposition
    /// unchanged (no trailing dot, which extension splitting collapses).
    pub fn segment() -> impl Strategy<Value = String> {
        prop::string::string_regex("[A-Za-z0-9_-]([A-Za-z0-9_.-]{0,6}[A-Za-z0-9_-])?").unwrap()
    }

    pub fn path() -> impl Strategy<Value = String> {
        prop::collection::vec(segment(), 1..5).prop_map(|segs| format!("/{}", segs.join("/")))
    }

    /// Distinct keys only: duplicate names collapse on parse, which would
    /// make verbatim round-trip comparisons meaningless.
    pub fn query() -> impl Strategy<Value = String> {
        prop::collection::btree_map("[a-z][a-z0-9]{0,5}", "[A-Za-z0-9]{0,6}", 0..4).prop_map(
            |pairs| {
                pairs
                    .into_iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join("&")
            },
        )
    }

    /// A well-formed remote URL assembled from the pieces above.
    pub fn url() -> impl Strategy<Value = String> {
        (scheme(), host(), path(), query()).prop_map(|(scheme, host, path, query)| {
            let mut out = format!("{scheme}://{host}{path}");
            if !query.is_empty() {
                out.push('?');
                out.push_str(&query);
            }
            out
        })
    }
}

proptest! {
    /// Parsing never panics, no matter the input.
    #[test]
    fn parser_is_total(input in ".{0,100}") {
        let _ = Url::parse(&input);
        let _ = Url::parse_local(&input);
    }

    /// Query parsing never panics and never errors.
    #[test]
    fn query_parsing_is_total(input in ".{0,100}") {
        let _ = Query::parse(&input);
    }

    /// display(parse(x)) is a fixed point: parsing what we print and
    /// printing again changes nothing.
    #[test]
    fn display_parse_fixed_point(input in strategies::url()) {
        let url = Url::parse(&input).unwrap();
        let shown = url.to_string();
        let reparsed = Url::parse(&shown).unwrap();
        prop_assert_eq!(&shown, &reparsed.to_string());
    }

    /// Generated URLs survive the first round trip verbatim.
    #[test]
    fn well_formed_urls_round_trip(input in strategies::url()) {
        let url = Url::parse(&input).unwrap();
        prop_assert_eq!(url.to_string(), input);
    }

    /// Path recombination matches the path that went in.
    #[test]
    fn path_recomposition(host in strategies::host(), path in strategies::path()) {
        let url = Url::parse(&format!("mem://{host}{path}")).unwrap();
        prop_assert_eq!(url.path(), path);
        prop_assert!(url.path().starts_with('/'));
    }

    /// Walking parents always terminates at the root.
    #[test]
    fn parent_chain_terminates(path in strategies::path()) {
        let mut url = Some(Url::parse(&format!("mem://h{path}")).unwrap());
        let mut hops = 0;
        while let Some(current) = url {
            url = current.parent();
            hops += 1;
            prop_assert!(hops <= 16, "parent chain did not terminate");
        }
    }
}
