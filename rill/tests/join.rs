//! Containment and counting laws of the join engine.

use rill::{Stream2, Stream};

fn left() -> Stream2<&'static str, i32> {
    Stream2::of_pairs([("a", 1), ("b", 2), ("c", 3)])
}

fn right() -> Stream2<&'static str, &'static str> {
    Stream2::of_pairs([("a", "x"), ("c", "z"), ("d", "w")])
}

#[test]
fn inner_join_rows_and_order() {
    let rows = left().join(right()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], ("a", (1, "x")));
    assert_eq!(rows[1], ("c", (3, "z")));
}

#[test]
fn matched_rows_nest_across_join_flavors() {
    let inner: Vec<_> = left().join(right()).collect();

    // Left join restricted to matched rows is the inner join.
    let left_matched: Vec<_> = left()
        .left_join(right())
        .collect()
        .into_iter()
        .filter_map(|(k, (a, b))| b.map(|b| (k, (a, b))))
        .collect();
    assert_eq!(left_matched, inner);

    // Full join restricted to doubly-present rows is the inner join too.
    let full_matched: Vec<_> = left()
        .full_join(right())
        .collect()
        .into_iter()
        .filter_map(|(k, (a, b))| a.zip(b).map(|ab| (k, ab)))
        .collect();
    assert_eq!(full_matched, inner);
}

#[test]
fn full_join_covers_both_sides() {
    let rows = left().full_join(right()).collect();
    assert_eq!(
        rows,
        vec![
            ("a", (Some(1), Some("x"))),
            ("b", (Some(2), None)),
            ("c", (Some(3), Some("z"))),
            ("d", (None, Some("w"))),
        ]
    );
}

#[test]
fn semi_plus_anti_counts_the_left_side() {
    let total = left().count();
    let semi = left().semi_join(right()).count();
    let anti = left().anti_join(right()).count();
    assert_eq!(semi + anti, total);
}

#[test]
fn cogroup_group_sizes() {
    let mut sizes: Vec<(&str, (usize, usize))> =
        Stream2::of_pairs([("a", 1), ("b", 2), ("a", 3)])
            .cogroup(Stream2::of_pairs([("a", "x"), ("c", "y")]))
            .map_values(|(l, r)| (l.len(), r.len()))
            .collect();
    sizes.sort_by_key(|(k, _)| *k);
    assert_eq!(sizes, vec![("a", (2, 1)), ("b", (1, 0)), ("c", (0, 1))]);
}

#[test]
fn joins_compose_with_the_rest_of_the_algebra() {
    // Orders joined to customers, then aggregated per customer.
    let orders = Stream2::of_pairs([(1, 250), (2, 100), (1, 75), (3, 40)]);
    let customers = Stream2::of_pairs([(1, "ada"), (2, "grace")]);

    let mut spend_by_name: Vec<(&str, i32)> = orders
        .join(customers)
        .map_pairs(|(_, (amount, name))| (name, amount))
        .reduce_by_key(|a, b| a + b)
        .collect();
    spend_by_name.sort();
    assert_eq!(spend_by_name, vec![("ada", 325), ("grace", 100)]);
}

#[test]
fn key_extractor_joins_match_keyed_joins() {
    let by_extractor = Stream::of([1, 2, 3])
        .join_by(Stream::of([10, 30]), |n| n % 10, |n| n / 10)
        .collect();
    let keyed = Stream2::of_pairs([(1, 1), (2, 2), (3, 3)])
        .join(Stream2::of_pairs([(1, 10), (3, 30)]))
        .collect();
    assert_eq!(by_extractor, keyed);
}
