//! Code tables for hit locations, hit items and causes of death.
//!
//! Version 4.2 of the game renumbered several codes, so each lookup takes the
//! [`ModVersion`] detected from the InitGame line.

use crate::ModVersion;

const HIT_POINTS_42: &[(u32, &str)] = &[
    (0, "HEAD"),
    (1, "HEAD"),
    (2, "HELMET"),
    (3, "TORSO"),
    (4, "VEST"),
    (5, "LEFT_ARM"),
    (6, "RIGHT_ARM"),
    (7, "GROIN"),
    (8, "BUTT"),
    (9, "LEFT_UPPER_LEG"),
    (10, "RIGHT_UPPER_LEG"),
    (11, "LEFT_LOWER_LEG"),
    (12, "RIGHT_LOWER_LEG"),
    (13, "LEFT_FOOT"),
    (14, "RIGHT_FOOT"),
];

const HIT_POINTS_41: &[(u32, &str)] = &[
    (0, "HEAD"),
    (1, "HELMET"),
    (2, "TORSO"),
    (3, "KEVLAR"),
    (4, "ARMS"),
    (5, "LEGS"),
    (6, "BODY"),
];

const HIT_ITEMS_42: &[(u32, &str)] = &[
    (1, "UT_MOD_KNIFE"),
    (2, "UT_MOD_BERETTA"),
    (3, "UT_MOD_DEAGLE"),
    (4, "UT_MOD_SPAS"),
    (5, "UT_MOD_MP5K"),
    (6, "UT_MOD_UMP45"),
    (8, "UT_MOD_LR300"),
    (9, "UT_MOD_G36"),
    (10, "UT_MOD_PSG1"),
    (14, "UT_MOD_SR8"),
    (15, "UT_MOD_AK103"),
    (17, "UT_MOD_NEGEV"),
    (19, "UT_MOD_M4"),
    (20, "UT_MOD_GLOCK"),
    (21, "UT_MOD_COLT1911"),
    (22, "UT_MOD_MAC11"),
    (23, "UT_MOD_BLED"),
    (24, "UT_MOD_KICKED"),
    (25, "UT_MOD_KNIFE_THROWN"),
];

const HIT_ITEMS_41: &[(u32, &str)] = &[
    (1, "UT_MOD_KNIFE"),
    (2, "UT_MOD_BERETTA"),
    (3, "UT_MOD_DEAGLE"),
    (4, "UT_MOD_SPAS"),
    (5, "UT_MOD_MP5K"),
    (6, "UT_MOD_UMP45"),
    (8, "UT_MOD_LR300"),
    (9, "UT_MOD_G36"),
    (10, "UT_MOD_PSG1"),
    (14, "UT_MOD_SR8"),
    (15, "UT_MOD_AK103"),
    (17, "UT_MOD_NEGEV"),
    (19, "UT_MOD_M4"),
    (21, "UT_MOD_KICKED"),
    (22, "UT_MOD_KNIFE_THROWN"),
];

const DEATH_CAUSES_42: &[(u32, &str)] = &[
    (1, "MOD_WATER"),
    (3, "MOD_LAVA"),
    (5, "UT_MOD_TELEFRAG"),
    (6, "MOD_FALLING"),
    (7, "UT_MOD_SUICIDE"),
    (9, "MOD_TRIGGER_HURT"),
    (10, "MOD_CHANGE_TEAM"),
    (12, "UT_MOD_KNIFE"),
    (13, "UT_MOD_KNIFE_THROWN"),
    (14, "UT_MOD_BERETTA"),
    (15, "UT_MOD_KNIFE_DEAGLE"),
    (16, "UT_MOD_SPAS"),
    (17, "UT_MOD_UMP45"),
    (18, "UT_MOD_MP5K"),
    (19, "UT_MOD_LR300"),
    (20, "UT_MOD_G36"),
    (21, "UT_MOD_PSG1"),
    (22, "UT_MOD_HK69"),
    (23, "UT_MOD_BLED"),
    (24, "UT_MOD_KICKED"),
    (25, "UT_MOD_HEGRENADE"),
    (28, "UT_MOD_SR8"),
    (30, "UT_MOD_AK103"),
    (31, "UT_MOD_SPLODED"),
    (32, "UT_MOD_SLAPPED"),
    (34, "UT_MOD_BOMBED"),
    (35, "UT_MOD_NUKED"),
    (36, "UT_MOD_NEGEV"),
    (37, "UT_MOD_HK69_HIT"),
    (38, "UT_MOD_M4"),
    (39, "UT_MOD_GLOCK"),
    (40, "UT_MOD_COLT1911"),
    (41, "UT_MOD_MAC11"),
    (42, "UT_MOD_FLAG"),
];

const DEATH_CAUSES_41: &[(u32, &str)] = &[
    (1, "MOD_WATER"),
    (3, "MOD_LAVA"),
    (5, "UT_MOD_TELEFRAG"),
    (6, "MOD_FALLING"),
    (7, "UT_MOD_SUICIDE"),
    (9, "MOD_TRIGGER_HURT"),
    (10, "MOD_CHANGE_TEAM"),
    (12, "UT_MOD_KNIFE"),
    (13, "UT_MOD_KNIFE_THROWN"),
    (14, "UT_MOD_BERETTA"),
    (15, "UT_MOD_KNIFE_DEAGLE"),
    (16, "UT_MOD_SPAS"),
    (17, "UT_MOD_UMP45"),
    (18, "UT_MOD_MP5K"),
    (19, "UT_MOD_LR300"),
    (20, "UT_MOD_G36"),
    (21, "UT_MOD_PSG1"),
    (22, "UT_MOD_HK69"),
    (23, "UT_MOD_BLED"),
    (24, "UT_MOD_KICKED"),
    (25, "UT_MOD_HEGRENADE"),
    (28, "UT_MOD_SR8"),
    (30, "UT_MOD_AK103"),
    (31, "UT_MOD_SPLODED"),
    (32, "UT_MOD_SLAPPED"),
    (33, "UT_MOD_BOMBED"),
    (34, "UT_MOD_NUKED"),
    (35, "UT_MOD_NEGEV"),
    (37, "UT_MOD_HK69_HIT"),
    (38, "UT_MOD_M4"),
    (39, "UT_MOD_FLAG"),
    (40, "UT_MOD_GOOMBA"),
];

/// Death cause that changing teams is reported with; never counts as a kill
pub const CHANGE_TEAM_CAUSE: u32 = 10;

/// Teammates blown up by the bomb are not treated as team kills
pub const BOMBED: &str = "UT_MOD_BOMBED";

/// Causes that always count as suicide, whoever the killer is
pub const SUICIDE_CAUSES: [&str; 6] = [
    "UT_MOD_SUICIDE",
    "MOD_FALLING",
    "MOD_WATER",
    "MOD_LAVA",
    "MOD_TRIGGER_HURT",
    "UT_MOD_SPLODED",
];

/// Causes that count as suicide only when killer and victim are the same
pub const SELF_INFLICTED_CAUSES: [&str; 5] = [
    "UT_MOD_HEGRENADE",
    "UT_MOD_HK69",
    "UT_MOD_NUKED",
    "UT_MOD_SLAPPED",
    "UT_MOD_BOMBED",
];

fn lookup(table: &'static [(u32, &'static str)], code: u32) -> Option<&'static str> {
    table
        .iter()
        .find(|(entry, _)| *entry == code)
        .map(|(_, name)| *name)
}

pub fn death_cause(version: ModVersion, code: u32) -> Option<&'static str> {
    match version {
        ModVersion::Urt41 => lookup(DEATH_CAUSES_41, code),
        ModVersion::Urt42 => lookup(DEATH_CAUSES_42, code),
    }
}

pub fn hit_location(version: ModVersion, code: u32) -> Option<&'static str> {
    match version {
        ModVersion::Urt41 => lookup(HIT_POINTS_41, code),
        ModVersion::Urt42 => lookup(HIT_POINTS_42, code),
    }
}

pub fn hit_item(version: ModVersion, code: u32) -> Option<&'static str> {
    match version {
        ModVersion::Urt41 => lookup(HIT_ITEMS_41, code),
        ModVersion::Urt42 => lookup(HIT_ITEMS_42, code),
    }
}

/// True for locations that count as a headshot
pub fn is_headshot(location: &str) -> bool {
    location == "HEAD" || location == "HELMET"
}
