//! WBI request signing for the gated main-comment endpoint
//!
//! The main comment listing rejects requests that do not carry a valid
//! `w_rid` signature. The signature is an MD5 keyed digest over a canonical
//! query string, keyed with a short-lived "mixin key" derived from two
//! rotating image-URL fragments served by the nav endpoint.
//!
//! The canonicalization order (inject `wts`, sanitize values, sort by key,
//! percent-encode, digest) is load-bearing: any reordering produces a
//! signature the platform rejects.

use crate::error::{Error, Result};
use url::Url;

/// Fixed permutation table used to derive the mixin key
///
/// Protocol constant, reproduced byte-for-byte from the community-known WBI
/// mixin table. Not derived at runtime.
const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, //
    15, 50, 10, 31, 58, 3, 45, 35, //
    27, 43, 5, 49, 33, 9, 42, 19, //
    29, 28, 14, 39, 12, 38, 41, 13, //
    37, 48, 7, 16, 24, 55, 40, 61, //
    26, 17, 0, 1, 60, 51, 30, 4, //
    22, 25, 54, 21, 56, 59, 6, 63, //
    57, 62, 11, 36, 20, 34, 44, 52,
];

/// Characters stripped from every parameter value before signing
const UNSAFE_VALUE_CHARS: [char; 5] = ['!', '\'', '(', ')', '*'];

/// Extract the key fragment (filename stem) from a wbi image URL
///
/// The nav endpoint serves the key material as two image URLs; the fragment
/// is the last path segment with its extension removed, e.g.
/// `https://i0.hdslb.com/bfs/wbi/abc123.png` yields `abc123`.
pub fn key_fragment(image_url: &str) -> Result<String> {
    let url = Url::parse(image_url)
        .map_err(|e| Error::Signing(format!("invalid wbi image url {image_url}: {e}")))?;
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| Error::Signing(format!("wbi image url has no filename: {image_url}")))?;
    let stem = name.split('.').next().unwrap_or(name);
    if stem.is_empty() {
        return Err(Error::Signing(format!(
            "wbi image url has an empty filename stem: {image_url}"
        )));
    }
    Ok(stem.to_string())
}

/// Derive the 32-character mixin key from the two rotating key fragments
///
/// Concatenates the fragments, selects bytes at the positions of
/// [`MIXIN_KEY_ENC_TAB`] in table order, and truncates to 32 characters.
/// Positions past the end of the concatenation are skipped, matching the
/// reference behavior for short inputs.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the derived key is empty — no signed
/// request is possible without it, which is fatal to the whole export.
pub fn mixin_key(img_key: &str, sub_key: &str) -> Result<String> {
    let combined: Vec<u8> = img_key.bytes().chain(sub_key.bytes()).collect();
    let mut key: Vec<u8> = MIXIN_KEY_ENC_TAB
        .iter()
        .filter_map(|&i| combined.get(i).copied())
        .collect();
    key.truncate(32);
    if key.is_empty() {
        return Err(Error::Signing(
            "derived mixin key is empty (no key material)".to_string(),
        ));
    }
    // Fragments are hex filename stems, so the selected bytes are ASCII
    String::from_utf8(key)
        .map_err(|_| Error::Signing("mixin key fragments are not ASCII".to_string()))
}

/// Sign a parameter set with the current Unix time
///
/// Convenience wrapper over [`sign_at`]. Returns the complete query string
/// including the injected `wts` and the appended `w_rid` signature.
pub fn sign(params: &[(&str, String)], mixin_key: &str) -> String {
    sign_at(params, mixin_key, chrono::Utc::now().timestamp())
}

/// Sign a parameter set at a fixed timestamp
///
/// Deterministic for fixed inputs: the output changes if and only if the
/// parameters, the mixin key, or `wts` change.
///
/// Canonicalization steps, in order:
/// 1. inject `wts` = the given Unix timestamp
/// 2. strip `!'()*` from every parameter value
/// 3. sort parameters lexicographically by key
/// 4. percent-encode and join into `k=v&…`
/// 5. append `w_rid` = lowercase hex MD5 of the query string + mixin key
pub fn sign_at(params: &[(&str, String)], mixin_key: &str, wts: i64) -> String {
    let mut entries: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| ((*k).to_string(), sanitize_value(v)))
        .collect();
    entries.push(("wts".to_string(), wts.to_string()));
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let query = entries
        .iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k),
                urlencoding::encode(v)
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    let digest = md5::compute(format!("{query}{mixin_key}"));
    format!("{query}&w_rid={digest:x}")
}

/// Strip the characters the platform refuses to sign over
fn sanitize_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !UNSAFE_VALUE_CHARS.contains(c))
        .collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    // Reference key material from the community WBI documentation
    const IMG_KEY: &str = "7cd084941338484aae1ad9425b84077c";
    const SUB_KEY: &str = "4932caff0ff746eab6f01bf08b70ac45";
    const MIXIN: &str = "ea1db124af3c7062474693fa704f4ff8";

    #[test]
    fn mixin_table_is_a_valid_permutation_prefix() {
        assert_eq!(MIXIN_KEY_ENC_TAB.len(), 64);
        let mut seen = [false; 64];
        for &i in &MIXIN_KEY_ENC_TAB {
            assert!(i < 64, "table entry {i} out of range");
            assert!(!seen[i], "table entry {i} duplicated");
            seen[i] = true;
        }
    }

    #[test]
    fn mixin_key_matches_reference_triple() {
        let key = mixin_key(IMG_KEY, SUB_KEY).unwrap();
        assert_eq!(key, MIXIN);
    }

    #[test]
    fn mixin_key_is_32_chars_drawn_from_inputs() {
        let key = mixin_key(IMG_KEY, SUB_KEY).unwrap();
        assert_eq!(key.len(), 32);
        let combined = format!("{IMG_KEY}{SUB_KEY}");
        assert!(key.chars().all(|c| combined.contains(c)));
    }

    #[test]
    fn mixin_key_is_pure() {
        let a = mixin_key(IMG_KEY, SUB_KEY).unwrap();
        let b = mixin_key(IMG_KEY, SUB_KEY).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mixin_key_rejects_empty_material() {
        let err = mixin_key("", "").unwrap_err();
        assert_eq!(err.error_code(), "signing_error");
    }

    #[test]
    fn key_fragment_strips_path_and_extension() {
        let frag =
            key_fragment("https://i0.hdslb.com/bfs/wbi/7cd084941338484aae1ad9425b84077c.png")
                .unwrap();
        assert_eq!(frag, "7cd084941338484aae1ad9425b84077c");
    }

    #[test]
    fn key_fragment_rejects_urls_without_a_filename() {
        assert!(key_fragment("https://i0.hdslb.com/").is_err());
        assert!(key_fragment("not a url").is_err());
    }

    #[test]
    fn md5_primitive_is_standards_conformant() {
        assert_eq!(
            format!("{:x}", md5::compute("")),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            format!("{:x}", md5::compute("abc")),
            "900150983cd24fb0d6963f7d28e17f72"
        );
    }

    #[test]
    fn sign_at_matches_documented_reference_vector() {
        let params = [
            ("foo", "114".to_string()),
            ("bar", "514".to_string()),
            ("zab", "1919810".to_string()),
        ];
        let signed = sign_at(&params, MIXIN, 1_702_204_169);
        assert_eq!(
            signed,
            "bar=514&foo=114&wts=1702204169&zab=1919810&w_rid=8f6f2b5b3d485fe1886cec6a0be8c5d4"
        );
    }

    #[test]
    fn sign_at_encodes_main_listing_params() {
        let params = [
            ("oid", "99999".to_string()),
            ("type", "1".to_string()),
            ("mode", "2".to_string()),
            ("pagination_str", r#"{"offset":""}"#.to_string()),
            ("plat", "1".to_string()),
            ("seek_rpid", String::new()),
            ("web_location", "1315875".to_string()),
        ];
        let signed = sign_at(&params, MIXIN, 1_700_000_000);
        assert_eq!(
            signed,
            "mode=2&oid=99999&pagination_str=%7B%22offset%22%3A%22%22%7D&plat=1&seek_rpid=\
             &type=1&web_location=1315875&wts=1700000000\
             &w_rid=8406475cfa148058842724143d9bc453"
        );
    }

    #[test]
    fn sign_at_strips_unsafe_chars_and_encodes_spaces() {
        let params = [
            ("a", "1!'()*2".to_string()),
            ("b", "x y".to_string()),
        ];
        let signed = sign_at(&params, MIXIN, 1_700_000_000);
        assert_eq!(
            signed,
            "a=12&b=x%20y&wts=1700000000&w_rid=a472c8426c61903f4897eb03ee30da67"
        );
    }

    #[test]
    fn sign_at_is_deterministic_for_fixed_inputs() {
        let params = [("oid", "2".to_string()), ("type", "1".to_string())];
        let first = sign_at(&params, MIXIN, 1_700_000_000);
        let second = sign_at(&params, MIXIN, 1_700_000_000);
        assert_eq!(first, second);
    }

    #[test]
    fn sign_at_changes_when_any_input_changes() {
        let params = [("oid", "2".to_string())];
        let base = sign_at(&params, MIXIN, 1_700_000_000);

        let other_params = [("oid", "3".to_string())];
        assert_ne!(base, sign_at(&other_params, MIXIN, 1_700_000_000));
        assert_ne!(base, sign_at(&params, "another-mixin-key-value-32-chars", 1_700_000_000));
        assert_ne!(base, sign_at(&params, MIXIN, 1_700_000_001));
    }

    #[test]
    fn sign_injects_current_timestamp() {
        let params = [("oid", "2".to_string())];
        let signed = sign(&params, MIXIN);
        assert!(signed.contains("&wts="));
        assert!(signed.contains("&w_rid="));
        // w_rid is 32 lowercase hex chars at the end
        let w_rid = signed.rsplit("w_rid=").next().unwrap();
        assert_eq!(w_rid.len(), 32);
        assert!(w_rid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
