//! End-to-end scenarios exercising a [`Traph`] through its public API:
//! shared-prefix page insertion, default and installed creation rules,
//! link-weight coalescing, retroactive rule application, and
//! file-backed persistence across a reopen.

use traph::{Traph, TraphConfig};

fn open_memory() -> Traph {
    let _ = env_logger::builder().is_test(true).try_init();
    Traph::open(TraphConfig::default()).unwrap()
}

#[test]
fn shared_prefix_pages_both_flagged() {
    let mut t = open_memory();
    t.add_page(b"s:http|h:com|h:example|p:a").unwrap();
    t.add_page(b"s:http|h:com|h:example|p:b").unwrap();

    let mut pages = t.pages_iter().unwrap();
    pages.sort();
    assert_eq!(
        pages,
        vec![
            b"s:http|h:com|h:example|p:a".to_vec(),
            b"s:http|h:com|h:example|p:b".to_vec(),
        ]
    );
}

#[test]
fn default_rule_produces_expanded_webentity_prefixes() {
    let mut config = TraphConfig::default();
    config.default_creation_rule_pattern = r"^s:https?\|h:[^|]+\|".to_string();
    let mut t = Traph::open(config).unwrap();

    let lru = b"s:http|h:example|p:a";
    let report = t.add_page(lru).unwrap();
    assert_eq!(report.webentities_created.len(), 1);

    let (&id, prefixes) = report.webentities_created.iter().next().unwrap();
    let candidate = b"s:http|h:example|".to_vec();
    let mut expected = t.expand_prefix(&candidate);
    expected.sort();
    let mut actual = prefixes.clone();
    actual.sort();
    assert_eq!(actual, expected);

    let stored = t.webentity_prefix_iter().unwrap();
    assert!(stored.iter().any(|(wid, _)| *wid == id));
}

#[test]
fn specific_rule_outcompetes_default_with_longer_candidate() {
    let mut config = TraphConfig::default();
    config.default_creation_rule_pattern = r"^s:https?\|h:[^|]+\|".to_string();
    config.initial_rules.push((
        b"s:http|h:example|".to_vec(),
        r"^s:http\|h:example\|p:[^|]+\|".to_string(),
    ));
    let mut t = Traph::open(config).unwrap();

    let report = t.add_page(b"s:http|h:example|p:section|p:a").unwrap();
    assert_eq!(report.webentities_created.len(), 1);
    let (_, prefixes) = report.webentities_created.iter().next().unwrap();
    assert!(prefixes
        .iter()
        .any(|p| p.starts_with(b"s:http|h:example|p:section|")));
}

#[test]
fn add_links_coalesces_weights_with_symmetric_inlinks() {
    let mut t = open_memory();
    let lru_a = b"s:http|h:example|p:a".to_vec();
    let lru_b = b"s:http|h:example|p:b".to_vec();
    let lru_c = b"s:http|h:example|p:c".to_vec();

    t.add_links(vec![
        (lru_a.clone(), lru_b.clone()),
        (lru_a.clone(), lru_b.clone()),
        (lru_a.clone(), lru_c.clone()),
    ])
    .unwrap();

    let mut links = t.links_iter().unwrap();
    links.sort();
    assert_eq!(
        links,
        vec![
            (lru_a.clone(), lru_b.clone(), 2),
            (lru_a.clone(), lru_c.clone(), 1),
        ]
    );
}

#[test]
fn installing_a_rule_after_the_fact_replays_existing_pages() {
    // a shallow host-stem default means every page first gets only a
    // host-level webentity; installing a deeper, path-level rule
    // afterward should retroactively create more specific webentities
    // for the pages it covers.
    let mut config = TraphConfig::default();
    config.default_creation_rule_pattern = r"^s:https?\|h:[^|]+\|".to_string();
    let mut t = Traph::open(config).unwrap();

    t.add_page(b"s:http|h:example|p:section|p:a").unwrap();
    t.add_page(b"s:http|h:example|p:section|p:b").unwrap();
    t.add_page(b"s:http|h:other|p:z").unwrap();

    let before = t.webentity_prefix_iter().unwrap().len();

    let report = t
        .add_webentity_creation_rule(
            b"s:http|h:example|",
            r"^s:http\|h:example\|p:[^|]+\|",
            true,
        )
        .unwrap();

    // both example-host pages share the installed rule's candidate
    // prefix, so only one new webentity should be created (the second
    // page's replay finds the first page's new webentity already
    // covers it).
    assert_eq!(report.webentities_created.len(), 1);
    let after = t.webentity_prefix_iter().unwrap().len();
    assert!(after > before);
}

#[test]
fn reopening_a_file_backed_traph_preserves_links_and_pages() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("store");
    let lru_a = b"s:http|h:example|p:a".to_vec();
    let lru_b = b"s:http|h:example|p:b".to_vec();

    {
        let mut config = TraphConfig::default();
        config.folder = Some(folder.clone());
        let mut t = Traph::open(config).unwrap();
        t.add_links(vec![(lru_a.clone(), lru_b.clone())]).unwrap();
    }

    let mut config = TraphConfig::default();
    config.folder = Some(folder);
    let mut reopened = Traph::open(config).unwrap();

    assert_eq!(
        reopened.links_iter().unwrap(),
        vec![(lru_a.clone(), lru_b.clone(), 1)]
    );
    let mut pages = reopened.pages_iter().unwrap();
    pages.sort();
    assert_eq!(pages, vec![lru_a, lru_b]);
}
