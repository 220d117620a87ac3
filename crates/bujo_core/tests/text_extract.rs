use bujo_core::text::{extract_mentions, extract_tags, extract_urls};

#[test]
fn tags_are_lowercased_deduplicated_and_sorted() {
    assert_eq!(
        extract_tags("#Work call with #home-office and #work again"),
        vec!["home-office", "work"]
    );
}

#[test]
fn tags_must_start_with_a_letter() {
    assert!(extract_tags("#1st #_x # bare").is_empty());
}

#[test]
fn mentions_support_dotted_names() {
    assert_eq!(
        extract_mentions("sync with @bob and @alice.smith"),
        vec!["alice.smith", "bob"]
    );
    assert!(extract_mentions("mail me at someone@example.com").is_empty());
}

#[test]
fn urls_keep_encounter_order() {
    let urls = extract_urls("docs (https://b.example/x) then http://a.example/y");
    assert_eq!(urls, vec!["https://b.example/x", "http://a.example/y"]);
}

#[test]
fn no_urls_is_an_empty_vec() {
    assert_eq!(extract_urls("nothing here"), Vec::<String>::new());
}
