use ndarray::array;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::NavigatorError;
use crate::replay_buffer::{Batch, ReplayBuffer, Transition};

fn transition(i: usize) -> Transition {
    Transition {
        state: array![i as f32, -(i as f32)],
        action: i % 3,
        reward: i as f32 * 0.5,
        next_state: array![(i + 1) as f32, -((i + 1) as f32)],
        done: i % 4 == 3,
    }
}

#[test]
fn test_replay_buffer_add_and_sample() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut buffer = ReplayBuffer::new(10);
    buffer.append(transition(2));
    assert_eq!(buffer.len(), 1);

    let batch = buffer.sample(1, &mut rng).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.states.row(0), array![2.0, -2.0]);
    assert_eq!(batch.actions, vec![2]);
    assert_eq!(batch.rewards[0], 1.0);
    assert_eq!(batch.next_states.row(0), array![3.0, -3.0]);
    assert_eq!(batch.dones[0], 0.0);
}

#[test]
fn test_replay_buffer_capacity() {
    let mut buffer = ReplayBuffer::new(3);
    for i in 0..5 {
        buffer.append(transition(i));
    }

    // Should only keep the last 3, oldest first
    assert_eq!(buffer.len(), 3);
    let kept: Vec<usize> = buffer.iter().map(|t| t.state[0] as usize).collect();
    assert_eq!(kept, vec![2, 3, 4]);
}

#[test]
fn test_zero_capacity_stores_nothing() {
    let mut buffer = ReplayBuffer::new(0);
    buffer.append(transition(0));
    assert!(buffer.is_empty());
}

#[test]
fn test_sample_more_than_stored() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut buffer = ReplayBuffer::new(10);
    for i in 0..3 {
        buffer.append(transition(i));
    }
    match buffer.sample(4, &mut rng) {
        Err(NavigatorError::InsufficientData {
            requested,
            available,
        }) => {
            assert_eq!(requested, 4);
            assert_eq!(available, 3);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
}

#[test]
fn test_sample_whole_buffer_has_no_repeats() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut buffer = ReplayBuffer::new(8);
    for i in 0..8 {
        buffer.append(transition(i));
    }
    let batch = buffer.sample(8, &mut rng).unwrap();
    let mut seen: Vec<usize> = batch.states.column(0).iter().map(|&v| v as usize).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..8).collect::<Vec<_>>());
}

#[test]
fn test_batch_rows_stay_aligned() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut buffer = ReplayBuffer::new(20);
    for i in 0..20 {
        buffer.append(transition(i));
    }
    let batch = buffer.sample(6, &mut rng).unwrap();
    for row in 0..batch.len() {
        let i = batch.states[[row, 0]] as usize;
        let expected = transition(i);
        assert_eq!(batch.actions[row], expected.action);
        assert_eq!(batch.rewards[row], expected.reward);
        assert_eq!(batch.next_states.row(row), expected.next_state);
        assert_eq!(batch.dones[row] == 1.0, expected.done);
    }
}

#[test]
fn test_same_seed_same_batch() {
    let mut buffer = ReplayBuffer::new(50);
    for i in 0..50 {
        buffer.append(transition(i));
    }
    let a = buffer.sample(10, &mut StdRng::seed_from_u64(3)).unwrap();
    let b = buffer.sample(10, &mut StdRng::seed_from_u64(3)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_batch_rejects_ragged_states() {
    let good = transition(0);
    let mut bad = transition(1);
    bad.next_state = array![1.0, 2.0, 3.0];
    assert!(matches!(
        Batch::from_transitions([&good, &bad]),
        Err(NavigatorError::DimensionMismatch { .. })
    ));
}
