use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use microcosm_core::layout::intent::{decode_intent, encode_intent, Action, Direction};
use microcosm_core::layout::{Genome, Voxel, VoxelKind, GENOME_LEN};
use microcosm_core::{SimParams, SimulationConfig};

const KINDS: [VoxelKind; 8] = [
    VoxelKind::Empty,
    VoxelKind::Wall,
    VoxelKind::Nutrient,
    VoxelKind::EnergySource,
    VoxelKind::Protocell,
    VoxelKind::Waste,
    VoxelKind::HeatSource,
    VoxelKind::ColdSource,
];

#[test]
fn voxel_roundtrip_over_randomized_values() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..10_000 {
        let kind = KINDS[rng.gen_range(0..KINDS.len())];
        let mut genome = [0u8; GENOME_LEN];
        rng.fill(&mut genome);
        let voxel = Voxel {
            kind,
            flags: rng.gen(),
            energy: rng.gen(),
            age: rng.gen(),
            // the species field itself must roundtrip whatever it holds
            species_id: rng.gen(),
            genome: Genome(genome),
            extra: [rng.gen(), rng.gen()],
        };
        assert_eq!(Voxel::unpack(voxel.pack()), voxel);
    }
}

#[test]
fn voxel_words_place_fields_where_documented() {
    let voxel = Voxel {
        kind: VoxelKind::Protocell,
        flags: 0x01,
        energy: 0xBEEF,
        age: 0x1234,
        species_id: 0x5678,
        genome: Genome([0; GENOME_LEN]),
        extra: [7, 9],
    };
    let words = voxel.pack();
    assert_eq!(words[0] & 0xFF, 4);
    assert_eq!((words[0] >> 8) & 0xFF, 0x01);
    assert_eq!(words[0] >> 16, 0xBEEF);
    assert_eq!(words[1] & 0xFFFF, 0x1234);
    assert_eq!(words[1] >> 16, 0x5678);
    assert_eq!(words[6], 7);
    assert_eq!(words[7], 9);
}

#[test]
fn intent_roundtrip_over_full_action_direction_grid() {
    let actions = [
        Action::None,
        Action::Die,
        Action::Predate,
        Action::Replicate,
        Action::Move,
        Action::Idle,
    ];
    let directions = [
        Direction::PosX,
        Direction::NegX,
        Direction::PosY,
        Direction::NegY,
        Direction::PosZ,
        Direction::NegZ,
        Direction::Here,
    ];
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    for &action in &actions {
        for &direction in &directions {
            for _ in 0..64 {
                let bid = rng.gen::<u32>() & 0x03FF_FFFF;
                let word = encode_intent(action, direction, bid);
                assert_eq!(decode_intent(word), (action, direction, bid));
            }
        }
    }
}

#[test]
fn cleared_intent_buffer_decodes_as_none() {
    let (action, _, bid) = decode_intent(0);
    assert_eq!(action, Action::None);
    assert_eq!(bid, 0);
}

#[test]
fn params_serialize_identically_on_repeated_calls() {
    let params = SimParams::from_config(&SimulationConfig::default(), 128);
    let a = bytemuck::bytes_of(&params).to_vec();
    let b = bytemuck::bytes_of(&params).to_vec();
    assert_eq!(a, b);
    assert_eq!(a.len(), 80);
}

#[test]
fn species_id_zero_is_substituted() {
    // an all-zero genome folds to zero before substitution
    assert_ne!(Genome([0; GENOME_LEN]).species_id(), 0);
}
