use serde::{Deserialize, Serialize};

/// Static definition of a world: identity, routing, and capacity.
/// Immutable after registration; population is derived, never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldDef {
    pub id: String,
    pub name: String,
    /// Routing path a connection must request to enter this world,
    /// e.g. `/worlds/fireplane`. Exact-match, unique across the catalog.
    pub path: String,
    pub capacity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl WorldDef {
    /// Derive the lobby-facing status line for a live population count.
    pub fn status(&self, population: usize) -> WorldStatus {
        let fullness = if self.capacity == 0 {
            1.0
        } else {
            (population as f64 / self.capacity as f64).clamp(0.0, 1.0)
        };
        WorldStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            population,
            fullness,
        }
    }
}

/// One world's entry in the lobby population snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldStatus {
    pub id: String,
    pub name: String,
    pub path: String,
    pub population: usize,
    /// Population divided by capacity, in [0, 1].
    pub fullness: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world(capacity: usize) -> WorldDef {
        WorldDef {
            id: "fireplane".to_string(),
            name: "Fireplane".to_string(),
            path: "/worlds/fireplane".to_string(),
            capacity,
            theme: Some("ember".to_string()),
        }
    }

    #[test]
    fn fullness_is_population_over_capacity() {
        let status = world(10).status(3);
        assert_eq!(status.population, 3);
        assert!((status.fullness - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn fullness_stays_in_unit_range() {
        assert!((world(10).status(0).fullness - 0.0).abs() < f64::EPSILON);
        assert!((world(10).status(10).fullness - 1.0).abs() < f64::EPSILON);
        // A count beyond capacity can only come from a bug upstream; the
        // derived ratio still clamps rather than reporting > 1.
        assert!((world(10).status(11).fullness - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn theme_is_optional_in_toml() {
        let def: WorldDef = toml::from_str(
            r#"
id = "frostveil"
name = "Frostveil"
path = "/worlds/frostveil"
capacity = 25
"#,
        )
        .unwrap();
        assert_eq!(def.theme, None);
        assert_eq!(def.capacity, 25);
    }
}
