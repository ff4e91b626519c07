//! Material name dictionary

use hashbrown::{HashMap, HashSet};

/// Material names known to the client, with their server-side ids
const BUILTIN_MATERIALS: &[(&str, i32)] = &[
    ("mat_default", 0),
    ("mat_nowalk_obstacle0", 1),
    ("mat_nowalk_obstacle1", 2),
    ("mat_nowalk_obstacle2", 3),
    ("mat_nowalk_obstacle3", 4),
    ("mat_nowalk_obstacle4", 5),
    ("mat_walk_obstacle1", 6),
    ("mat_walk_obstacle2", 7),
    ("mat_walk_obstacle3", 8),
    ("mat_walk_obstacle4", 9),
    ("mat_nobreathing", 10),
    ("mat_abyss_castle_shield", 11),
    ("mat_lava", 12),
    ("mat_passby_dmg_shield", 13),
    ("mat_ab1_light_start", 14),
    ("mat_ab1_dark_start", 15),
    ("mat_ab1_flamemoon", 16),
    ("mat_grass", 20),
    ("mat_sand", 21),
    ("mat_dirt", 22),
    ("mat_pavement", 23),
    ("mat_wood", 24),
    ("mat_stone_tough", 25),
    ("mat_stone_marble", 26),
    ("mat_pebble", 27),
    ("mat_metal_plate", 28),
    ("mat_metal_wirenet", 29),
    ("mat_fabric", 30),
    ("mat_leaves", 31),
    ("mat_water", 32),
    ("mat_water_deep", 33),
    ("mat_magic_circle", 34),
    ("mat_flesh", 35),
    ("mat_sand_wet", 36),
    ("mat_under_water", 37),
    ("mat_mob_insect", 38),
    ("mat_mob_reptile", 39),
    ("mat_mob_rotten", 40),
    ("mat_mob_hard", 41),
    ("mat_mob_wood", 42),
    ("mat_mob_orc", 43),
    ("mat_mob_boss", 44),
    ("mat_e3item_book", 45),
    ("mat_item_wood", 46),
    ("foot_2leg_small", 47),
    ("foot_2leg_medium", 48),
    ("foot_2leg_big", 49),
    ("foot_4leg_small", 50),
    ("foot_4leg_medium", 51),
    ("foot_4leg_big", 52),
    ("foot_reptile_small", 53),
    ("foot_reptile_medium", 54),
    ("foot_reptile_big", 55),
    ("foot_flying", 56),
    ("foot_insect", 57),
    ("foot_etc", 58),
    ("mat_snow", 59),
    ("mat_fire", 60),
    ("mat_cond_fire", 61),
    ("mat_weather_cond_fire", 62),
    ("mat_time_cond_fire", 63),
    ("mat_sword_s", 64),
    ("mat_sword_m", 65),
    ("mat_sword_h", 66),
    ("mat_mace_s", 67),
    ("mat_mace_m", 68),
    ("mat_mace_h", 69),
    ("mat_dagger_s", 70),
    ("mat_dagger_m", 71),
    ("mat_dagger_h", 72),
    ("mat_orb_s", 73),
    ("mat_orb_m", 74),
    ("mat_orb_h", 75),
    ("mat_book_s", 76),
    ("mat_book_m", 77),
    ("mat_book_h", 78),
    ("mat_2hsword_s", 79),
    ("mat_2hsword_m", 80),
    ("mat_2hsword_h", 81),
    ("mat_polearm_s", 82),
    ("mat_polearm_m", 83),
    ("mat_polearm_h", 84),
    ("mat_staff_s", 85),
    ("mat_staff_m", 86),
    ("mat_staff_h", 87),
    ("mat_bow_s", 88),
    ("mat_bow_m", 89),
    ("mat_bow_h", 90),
    ("mat_hp_regen", 91),
    ("mat_poison_recovery_a", 92),
    ("mat_poison_recovery_b", 93),
    ("mat_gold", 94),
    ("mat_deep_sand", 95),
    ("mat_swamp", 96),
    ("mat_strong_lava", 97),
    ("foot_2leg_shulack", 98),
    ("mat_Test_Material1", 99),
    ("mat_Test_Material2", 100),
    ("mat_Test_Material3", 101),
    ("mat_poison", 102),
    ("mat_Medium_lava", 103),
    ("mat_housing_type1", 104),
    ("mat_housing_type2", 105),
    ("mat_housing_type3", 106),
    ("mat_drana", 107),
    ("mat_acidheal", 108),
    ("foot_2leg_Pet", 109),
    ("foot_4leg_Pet", 110),
    ("mat_Swamp_Arena", 111),
    ("mat_mud_Arena", 112),
    ("mat_water_damage_arena", 113),
    ("mat_housing_spa", 114),
    ("mat_dispel_corn", 115),
    ("mat_dispel_starturtle", 116),
    ("mat_dispel_starfish", 117),
    ("mat_must_die", 118),
    ("mat_rainwater_Arena", 119),
    ("mat_oditonite_Arena", 120),
    ("mat_default_obstacle_1", 121),
    ("mat_default_obstacle_2", 122),
    ("mat_default_obstacle_3", 123),
    ("mat_default_obstacle_4", 124),
    ("mat_id_01", 125),
    ("mat_id_02", 126),
    ("mat_id_03", 127),
    ("foot_drakan_F_heel", 128),
    ("foot_drakan_M_boots", 129),
    ("foot_drakan_bare", 130),
    ("foot_robot", 131),
    ("mat_rainwater_6vs6Boss", 132),
    ("foot_npc", 133),
    ("mat_Medium_lava_LDF5", 134),
    ("mat_ab1_buildup_op_light", 135),
    ("mat_ab1_buildup_op_dark", 136),
    ("mat_poison_dmg1", 139),
    ("mat_poison_die", 140),
    ("mat_eresukigal_dmg", 141),
    ("mat_FFA_Hide", 142),
];

/// Ids that carry server-side meaning beyond plain collision
///
/// Skill obstacles (121-124) are deliberately absent.
const BUILTIN_INTENTION_IDS: &[i32] = &[
    11, 12, 13, 14, 15, 16, 60, 61, 62, 63, 91, 92, 93, 97, 99, 100, 101, 103, 107, 108, 111,
    113, 114, 115, 116, 117, 118, 125, 126, 127, 132, 134, 135, 136, 139, 140, 141, 142,
];

/// Immutable name-to-id dictionary plus the intention id subset
#[derive(Debug, Clone)]
pub struct MaterialTable {
    ids: HashMap<String, i32>,
    intention_ids: HashSet<i32>,
}

impl MaterialTable {
    pub fn new(
        ids: impl IntoIterator<Item = (String, i32)>,
        intention_ids: impl IntoIterator<Item = i32>,
    ) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            intention_ids: intention_ids.into_iter().collect(),
        }
    }

    /// The dictionary compiled into the tool
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_MATERIALS
                .iter()
                .map(|&(name, id)| (name.to_string(), id)),
            BUILTIN_INTENTION_IDS.iter().copied(),
        )
    }

    /// Id of a material name, -1 when unknown (names are case-sensitive)
    pub fn id_of(&self, name: &str) -> i32 {
        self.ids.get(name).copied().unwrap_or(-1)
    }

    pub fn is_intention(&self, id: i32) -> bool {
        self.intention_ids.contains(&id)
    }

    /// The id as a stored material id, if it is an intention id
    pub fn semantic(&self, id: i32) -> Option<u8> {
        if self.is_intention(id) {
            u8::try_from(id).ok()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self::builtin()
    }
}
