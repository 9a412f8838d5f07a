use super::*;
use crate::timing::schedule;

fn delays(values: &[u32]) -> Vec<DelayRecord> {
    values
        .iter()
        .enumerate()
        .map(|(frame_index, &delay_cs)| DelayRecord {
            frame_index,
            delay_cs,
        })
        .collect()
}

#[test]
fn expands_by_gcd_at_constant_rate() {
    let d = delays(&[10, 10, 20, 10, 10, 10, 20, 10]);
    let mut policy = GcdExpansion::new();
    let plan = schedule(&mut policy, &d, Timescale::DEFAULT).unwrap();

    assert_eq!(policy.unit_cs(), 10);
    assert_eq!(plan.len(), 10);
    assert!(plan.emissions.iter().all(|e| e.duration_ticks() == 60));
    let frames: Vec<usize> = plan.emissions.iter().map(|e| e.frame_index).collect();
    assert_eq!(frames, vec![0, 1, 2, 2, 3, 4, 5, 6, 6, 7]);
    assert_eq!(plan.total_duration().ticks, 600);
}

#[test]
fn emission_count_is_sum_over_gcd() {
    for values in [vec![4, 6, 9], vec![5], vec![12, 18, 24], vec![7, 7, 7, 7]] {
        let d = delays(&values);
        let g = crate::foundation::math::gcd_all(values.iter().copied());
        let expected = values.iter().sum::<u32>() / g;
        let plan = schedule(&mut GcdExpansion::new(), &d, Timescale::DEFAULT).unwrap();
        assert_eq!(plan.len() as u32, expected, "{values:?}");
        assert_eq!(GcdExpansion::expanded_len(&d), u64::from(expected));
    }
}

#[test]
fn coprime_delays_expand_to_one_emission_per_centisecond() {
    let d = delays(&[2, 3]);
    let plan = schedule(&mut GcdExpansion::new(), &d, Timescale::DEFAULT).unwrap();
    assert_eq!(plan.len(), 5);
    assert_eq!(plan.end_ticks(), vec![6, 12, 18, 24, 30]);
}

#[test]
fn empty_input_is_a_noop() {
    let mut policy = GcdExpansion::new();
    let plan = schedule(&mut policy, &[], Timescale::DEFAULT).unwrap();
    assert!(plan.is_empty());
    assert_eq!(policy.unit_cs(), 1);
    assert_eq!(GcdExpansion::expanded_len(&[]), 0);
}

#[test]
fn delay_outside_prescan_is_rejected() {
    let mut policy = GcdExpansion::new();
    policy.begin(Timescale::DEFAULT, &delays(&[10, 20])).unwrap();
    let stray = DelayRecord {
        frame_index: 5,
        delay_cs: 15,
    };
    assert!(policy.place(stray).is_err());
    assert!(policy.requires_prescan());
}
