use serde::{Deserialize, Serialize};

/// Derived statistics attached to a film by the aggregation phase.
///
/// `cast` fields average (or take the maximum of) each actor's statistic
/// over their films released strictly before this one; `director` fields are
/// the director's own statistics over the same window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilmAggregates {
    pub avg_cast_appearances: f64,
    pub max_cast_appearances: f64,
    pub avg_cast_revenue: f64,
    pub max_cast_revenue: f64,
    pub avg_cast_critic_score: f64,
    pub max_cast_critic_score: f64,
    pub avg_cast_audience_score: f64,
    pub max_cast_audience_score: f64,
    pub avg_cast_votes: f64,
    pub max_cast_votes: f64,
    pub avg_cast_age: f64,

    pub director_film_count: f64,
    pub avg_director_revenue: f64,
    pub max_director_revenue: f64,
    pub avg_director_critic_score: f64,
    pub max_director_critic_score: f64,
    pub avg_director_audience_score: f64,
    pub max_director_audience_score: f64,
    pub avg_director_votes: f64,
    pub max_director_votes: f64,
    pub director_age: f64,
}
