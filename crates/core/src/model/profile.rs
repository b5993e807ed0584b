use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Serialize;

use crate::model::ids::UserId;

const ADJECTIVES: [&str; 10] = [
    "Brilliant", "Quick", "Smart", "Sharp", "Bright", "Clever", "Skilled", "Expert", "Wise",
    "Genius",
];
const NOUNS: [&str; 10] = [
    "Mind",
    "Doctor",
    "Healer",
    "Student",
    "Scholar",
    "Medic",
    "Surgeon",
    "Pro",
    "Expert",
    "Specialist",
];
const SYMBOLS: [&str; 8] = ["!", "#", "$", "%", "&", "+", "*", "~"];

/// Generate a display username such as `SharpMedic042#`.
pub fn generate_username<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Quick");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Mind");
    let number: u32 = rng.random_range(0..1000);
    let symbol = SYMBOLS.choose(rng).copied().unwrap_or("!");
    format!("{adjective}{noun}{number:03}{symbol}")
}

/// Leaderboard-facing profile with aggregate quiz statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub quiz_count: u32,
    pub total_score: u64,
    pub average_rating: f64,
}

impl UserProfile {
    #[must_use]
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        display_name: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            display_name,
            created_at,
            quiz_count: 0,
            total_score: 0,
            average_rating: 0.0,
        }
    }

    /// Fold one completed quiz score into the aggregates.
    pub fn record_quiz(&mut self, score: u32) {
        self.quiz_count = self.quiz_count.saturating_add(1);
        self.total_score = self.total_score.saturating_add(u64::from(score));
        #[allow(clippy::cast_precision_loss)]
        {
            self.average_rating = self.total_score as f64 / f64::from(self.quiz_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn username_has_expected_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let name = generate_username(&mut rng);
        assert!(ADJECTIVES.iter().any(|a| name.starts_with(a)));
        let digits: String = name.chars().filter(char::is_ascii_digit).collect();
        assert_eq!(digits.len(), 3);
        assert!(SYMBOLS.iter().any(|s| name.ends_with(s)));
    }

    #[test]
    fn record_quiz_updates_average() {
        let mut profile = UserProfile::new(UserId::new("u1"), "QuickMind001!", None, fixed_now());
        profile.record_quiz(40);
        profile.record_quiz(60);
        assert_eq!(profile.quiz_count, 2);
        assert_eq!(profile.total_score, 100);
        assert!((profile.average_rating - 50.0).abs() < f64::EPSILON);
    }
}
