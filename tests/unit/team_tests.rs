//! Unit tests for team alias resolution.

use job_caster::models::Team;

#[test]
fn aliases_resolve_to_their_team() {
    let cases = [
        ("aart", Team::Art),
        ("Concept Art", Team::Art),
        ("Level Design", Team::GameDesign),
        ("systems_design", Team::GameDesign),
        ("Engineering", Team::Dev),
        ("software", Team::Dev),
        ("QA", Team::Others),
        ("producer", Team::Others),
    ];
    for (raw, expected) in cases {
        assert_eq!(Team::sanitize(raw), expected, "alias {raw}");
    }
}

#[test]
fn unknown_or_blank_input_is_others() {
    assert_eq!(Team::sanitize(""), Team::Others);
    assert_eq!(Team::sanitize("   "), Team::Others);
    assert_eq!(Team::sanitize("narrative"), Team::Others);
}

#[test]
fn sanitize_is_closed_over_canonical_names() {
    for team in Team::ALL {
        assert_eq!(Team::sanitize(team.as_str()), team);
        assert_eq!(Team::sanitize(&team.to_string()), team);
    }
}

#[test]
fn canonical_parse_is_strict() {
    assert_eq!(Team::from_canonical("game_design"), Some(Team::GameDesign));
    assert_eq!(Team::from_canonical("Game Design"), Some(Team::GameDesign));
    assert_eq!(Team::from_canonical("design"), None);
}

#[test]
fn serializes_as_snake_case() {
    let json = serde_json::to_string(&Team::GameDesign).unwrap();
    assert_eq!(json, "\"game_design\"");
}
