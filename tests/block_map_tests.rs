use proptest::prelude::*;
use rhoforge::blocks::{BlockMap, BlockTriple, MergeRate};
use rhoforge::error::RhoError;
use rstest::rstest;

fn layout(map: &BlockMap) -> Vec<(usize, usize)> {
    map.triples().iter().map(|t| (t.pos, t.size)).collect()
}

#[test]
fn test_split_then_merge_restores_single_block() {
    let mut map = BlockMap::single(100, 1.0).unwrap();
    let original = map.triples();

    let head = map.head();
    let right = map.split(head, 40, 1.0).unwrap();
    assert_eq!(layout(&map), vec![(0, 40), (40, 60)]);
    map.validate().unwrap();

    map.merge(head, right, MergeRate::LengthWeighted).unwrap();
    assert_eq!(map.triples(), original);
    assert_eq!(
        map.triples(),
        vec![BlockTriple {
            pos: 0,
            size: 100,
            rate: 1.0
        }]
    );
    map.validate().unwrap();
}

#[rstest]
#[case(MergeRate::LengthWeighted, 2.2)]
#[case(MergeRate::Left, 1.0)]
#[case(MergeRate::Right, 3.0)]
#[case(MergeRate::Fixed(0.5), 0.5)]
fn test_merge_rate_policies(#[case] policy: MergeRate, #[case] expected: f64) {
    let mut map = BlockMap::single(100, 1.0).unwrap();
    let head = map.head();
    let right = map.split(head, 40, 3.0).unwrap();
    map.merge(head, right, policy).unwrap();
    let rate = map.get(head).unwrap().rate;
    assert!((rate - expected).abs() < 1e-12);
}

#[rstest]
#[case(0)]
#[case(10)]
#[case(25)]
fn test_split_rejects_edge_offsets(#[case] offset: usize) {
    let mut map = BlockMap::from_runs(&[(10, 1.0), (5, 2.0)]).unwrap();
    let before = map.triples();
    let head = map.head();
    let err = map.split(head, offset, 9.0).unwrap_err();
    assert!(matches!(err, RhoError::InvalidOffset { .. }));
    assert_eq!(map.triples(), before);
}

#[test]
fn test_merge_requires_neighbours() {
    let mut map = BlockMap::from_runs(&[(3, 1.0), (3, 2.0), (3, 3.0)]).unwrap();
    let ids = map.ids();
    let before = map.triples();

    for (a, b) in [(ids[0], ids[2]), (ids[1], ids[0])] {
        let err = map.merge(a, b, MergeRate::Left).unwrap_err();
        assert!(matches!(err, RhoError::NotAdjacent { .. }));
    }
    assert_eq!(map.triples(), before);
}

#[test]
fn test_shift_boundary_moves_both_blocks() {
    let mut map = BlockMap::from_runs(&[(4, 1.0), (6, 2.0)]).unwrap();
    let ids = map.ids();
    map.shift_boundary(ids[0], ids[1], 3).unwrap();
    assert_eq!(layout(&map), vec![(0, 7), (7, 3)]);
    map.shift_boundary(ids[0], ids[1], -5).unwrap();
    assert_eq!(layout(&map), vec![(0, 2), (2, 8)]);
    map.validate().unwrap();
}

#[rstest]
#[case(4)]
#[case(-2)]
#[case(-9)]
#[case(isize::MAX)]
#[case(isize::MIN)]
fn test_shift_boundary_cannot_empty_a_block(#[case] delta: isize) {
    let mut map = BlockMap::from_runs(&[(2, 1.0), (4, 2.0)]).unwrap();
    let ids = map.ids();
    let before = map.triples();
    let err = map.shift_boundary(ids[0], ids[1], delta).unwrap_err();
    assert!(matches!(err, RhoError::BoundaryOverflow { .. }));
    assert_eq!(map.triples(), before);
}

#[test]
fn test_freed_ids_are_reused_and_stale_ids_fail() {
    let mut map = BlockMap::single(10, 1.0).unwrap();
    let head = map.head();
    let b = map.split(head, 5, 2.0).unwrap();
    map.merge(head, b, MergeRate::Left).unwrap();
    assert!(matches!(map.get(b), Err(RhoError::UnknownBlock(_))));

    let again = map.split(head, 3, 4.0).unwrap();
    assert_eq!(again, b);
    assert_eq!(map.get(again).unwrap().pos, 3);
}

#[test]
fn test_locate_and_interval_rates() {
    let map = BlockMap::from_runs(&[(2, 1.0), (3, 2.0), (1, 0.5)]).unwrap();
    assert_eq!(map.interval_rates(), vec![1.0, 1.0, 2.0, 2.0, 2.0, 0.5]);
    let ids = map.ids();
    assert_eq!(map.locate(0), Some(ids[0]));
    assert_eq!(map.locate(4), Some(ids[1]));
    assert_eq!(map.locate(5), Some(ids[2]));
    assert_eq!(map.locate(6), None);
}

#[test]
fn test_per_interval_layout() {
    let map = BlockMap::per_interval(&[0.1, 0.2, 0.3]).unwrap();
    assert_eq!(map.len(), 3);
    assert_eq!(layout(&map), vec![(0, 1), (1, 1), (2, 1)]);
    map.validate().unwrap();
    assert!(BlockMap::single(0, 1.0).is_err());
}

#[derive(Debug, Clone)]
enum Op {
    Split(usize, usize),
    Merge(usize),
    Shift(usize, isize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..64, 0usize..64).prop_map(|(b, o)| Op::Split(b, o)),
        (0usize..64).prop_map(Op::Merge),
        (0usize..64, -8isize..8).prop_map(|(b, d)| Op::Shift(b, d)),
    ]
}

proptest! {
    #[test]
    fn prop_edits_keep_map_consistent(
        intervals in 1usize..60,
        ops in prop::collection::vec(arb_op(), 1..80),
    ) {
        let mut map = BlockMap::single(intervals, 1.0).unwrap();
        for op in ops {
            let ids = map.ids();
            let before = map.triples();
            let result = match op {
                Op::Split(b, o) => map.split(ids[b % ids.len()], o, 2.0).map(|_| ()),
                Op::Merge(b) if ids.len() > 1 => {
                    let i = b % (ids.len() - 1);
                    map.merge(ids[i], ids[i + 1], MergeRate::LengthWeighted).map(|_| ())
                }
                Op::Merge(_) => Ok(()),
                Op::Shift(b, d) if ids.len() > 1 => {
                    let i = b % (ids.len() - 1);
                    map.shift_boundary(ids[i], ids[i + 1], d)
                }
                Op::Shift(..) => Ok(()),
            };
            if result.is_err() {
                prop_assert_eq!(map.triples(), before);
            }
            prop_assert!(map.validate().is_ok());
            let total: usize = map.triples().iter().map(|t| t.size).sum();
            prop_assert_eq!(total, intervals);
        }
    }

    #[test]
    fn prop_merging_everything_restores_original(
        intervals in 2usize..50,
        cuts in prop::collection::vec(1usize..50, 0..10),
    ) {
        let mut map = BlockMap::single(intervals, 1.0).unwrap();
        for c in cuts {
            if let Some(id) = map.locate(c % intervals) {
                let b = *map.get(id).unwrap();
                let _ = map.split(id, c % intervals - b.pos, 1.0);
            }
        }
        while map.len() > 1 {
            let ids = map.ids();
            map.merge(ids[0], ids[1], MergeRate::LengthWeighted).unwrap();
        }
        prop_assert_eq!(layout(&map), vec![(0, intervals)]);
        prop_assert!((map.get(map.head()).unwrap().rate - 1.0).abs() < 1e-12);
    }
}
