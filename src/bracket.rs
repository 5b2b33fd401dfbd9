use crate::types::{Game, MAX_BRACKET_SIZE};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

/// Seed-rank index for each round-0 position of a 16 entrant field.
/// Pairs read 1v16, 8v9, 5v12, 4v13, 6v11, 3v14, 7v10, 2v15.
pub const SIXTEEN_SEED_ORDER: [usize; 16] = [0, 15, 7, 8, 4, 11, 3, 12, 5, 10, 2, 13, 6, 9, 1, 14];

// ── Slots ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketEntrant {
  pub id: String,
  pub title: String,
  pub slug: String,
  pub image: Option<String>,
  pub hype: u8,
  pub seed: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Slot {
  Entrant(BracketEntrant),
  /// Waiting on an undecided match.
  Pending,
  /// No entrant can ever arrive here.
  Vacant,
}

impl Slot {
  pub fn entrant(&self) -> Option<&BracketEntrant> {
    match self {
      Slot::Entrant(entrant) => Some(entrant),
      _ => None,
    }
  }

  pub fn entrant_id(&self) -> Option<&str> {
    self.entrant().map(|entrant| entrant.id.as_str())
  }

  pub fn is_decided(&self) -> bool {
    !matches!(self, Slot::Pending)
  }
}

// ── Vote map ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey {
  pub round: usize,
  pub index: usize,
}

impl MatchKey {
  pub fn new(round: usize, index: usize) -> Self {
    MatchKey { round, index }
  }
}

impl fmt::Display for MatchKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}-{}", self.round, self.index)
  }
}

impl FromStr for MatchKey {
  type Err = String;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    let (round, index) = raw
      .trim()
      .split_once('-')
      .ok_or_else(|| format!("Match key {raw:?} must look like <round>-<match>."))?;
    let round = round
      .parse::<usize>()
      .map_err(|e| format!("Match key {raw:?} has a bad round: {e}"))?;
    let index = index
      .parse::<usize>()
      .map_err(|e| format!("Match key {raw:?} has a bad match index: {e}"))?;
    Ok(MatchKey { round, index })
  }
}

impl Serialize for MatchKey {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for MatchKey {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
  }
}

/// Recorded winners keyed by match, persisted as `{"<round>-<match>": "<game id>"}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteMap {
  votes: BTreeMap<MatchKey, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteChange {
  Recorded,
  Cleared,
}

impl VoteMap {
  pub fn new() -> Self {
    VoteMap::default()
  }

  pub fn get(&self, round: usize, index: usize) -> Option<&str> {
    self.votes.get(&MatchKey::new(round, index)).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.votes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.votes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&MatchKey, &String)> {
    self.votes.iter()
  }

  /// Same winner twice clears the entry, anything else overwrites it.
  pub fn toggle(&mut self, key: MatchKey, game_id: &str) -> VoteChange {
    if self.votes.get(&key).map(String::as_str) == Some(game_id) {
      self.votes.remove(&key);
      VoteChange::Cleared
    } else {
      self.votes.insert(key, game_id.to_string());
      VoteChange::Recorded
    }
  }

  pub fn clear(&mut self) {
    self.votes.clear();
  }
}

// ── Seeding ────────────────────────────────────────────────────────────

pub fn round_count(size: usize) -> usize {
  size.trailing_zeros() as usize
}

pub fn validate_size(size: usize) -> Result<(), String> {
  if size < 2 || !size.is_power_of_two() {
    return Err(format!("Bracket size must be a power of two of at least 2 (got {size})."));
  }
  if size > MAX_BRACKET_SIZE {
    return Err(format!("Bracket size must be at most {MAX_BRACKET_SIZE} (got {size})."));
  }
  Ok(())
}

/// Zero-based seed rank for every round-0 position.
pub fn seed_order(size: usize) -> Result<Vec<usize>, String> {
  validate_size(size)?;
  if size == SIXTEEN_SEED_ORDER.len() {
    return Ok(SIXTEEN_SEED_ORDER.to_vec());
  }
  Ok(seed_positions(size).into_iter().map(|seed| seed - 1).collect())
}

fn seed_positions(size: usize) -> Vec<usize> {
  let mut seeds = vec![1usize];
  while seeds.len() < size {
    let n = seeds.len();
    let mut next = Vec::with_capacity(n * 2);
    for seed in seeds.iter().copied() {
      next.push(seed);
      next.push((n * 2 + 1).saturating_sub(seed));
    }
    seeds = next;
  }
  seeds
}

pub fn compare_by_hype(a: &Game, b: &Game) -> Ordering {
  b.hype
    .cmp(&a.hype)
    .then_with(|| a.title.cmp(&b.title))
    .then_with(|| a.id.cmp(&b.id))
}

/// Places the `size` highest-hype games into round 0. Positions whose seed
/// rank exceeds the catalog length are vacant.
pub fn seed(catalog: &[Game], size: usize) -> Result<Vec<Slot>, String> {
  let order = seed_order(size)?;
  let mut ranked: Vec<&Game> = catalog.iter().collect();
  ranked.sort_by(|a, b| compare_by_hype(a, b));
  ranked.truncate(size);

  Ok(
    order
      .into_iter()
      .map(|rank| match ranked.get(rank) {
        Some(game) => Slot::Entrant(BracketEntrant {
          id: game.id.clone(),
          title: game.title.clone(),
          slug: game.slug.clone(),
          image: game.image.clone(),
          hype: game.hype,
          seed: rank as u32 + 1,
        }),
        None => Slot::Vacant,
      })
      .collect(),
  )
}

// ── Round reduction ────────────────────────────────────────────────────

fn resolve_match(a: &Slot, b: &Slot, vote: Option<&str>) -> Slot {
  match (a, b) {
    (Slot::Entrant(left), Slot::Entrant(right)) => match vote {
      Some(id) if id == left.id => a.clone(),
      Some(id) if id == right.id => b.clone(),
      _ => Slot::Pending,
    },
    (Slot::Entrant(_), Slot::Vacant) => a.clone(),
    (Slot::Vacant, Slot::Entrant(_)) => b.clone(),
    (Slot::Vacant, Slot::Vacant) => Slot::Vacant,
    _ => Slot::Pending,
  }
}

/// Rebuilds every round from round 0 and the recorded votes. Pure: the same
/// inputs always produce the same rounds.
pub fn compute_rounds(round0: &[Slot], votes: &VoteMap) -> Vec<Vec<Slot>> {
  if round0.is_empty() {
    return Vec::new();
  }
  let mut rounds = vec![round0.to_vec()];
  while let Some(current) = rounds.last() {
    if current.len() <= 1 {
      break;
    }
    let round = rounds.len() - 1;
    let next = current
      .chunks(2)
      .enumerate()
      .map(|(index, pair)| {
        let b = pair.get(1).unwrap_or(&Slot::Vacant);
        resolve_match(&pair[0], b, votes.get(round, index))
      })
      .collect();
    rounds.push(next);
  }
  rounds
}

pub fn champion(rounds: &[Vec<Slot>]) -> Option<&BracketEntrant> {
  let last = rounds.last()?;
  if last.len() != 1 {
    return None;
  }
  last[0].entrant()
}

pub fn validate_match(size: usize, round: usize, index: usize) -> Result<(), String> {
  validate_size(size)?;
  let rounds = round_count(size);
  if round >= rounds {
    return Err(format!(
      "Invalid match {round}-{index}: a {size} entrant bracket has rounds 0 to {}.",
      rounds - 1
    ));
  }
  let matches = size >> (round + 1);
  if index >= matches {
    return Err(format!(
      "Invalid match {round}-{index}: round {round} has matches 0 to {}.",
      matches - 1
    ));
  }
  Ok(())
}

pub fn round_label(round: usize, total_rounds: usize) -> String {
  let remaining = total_rounds.saturating_sub(round);
  match remaining {
    0 => "Champion".to_string(),
    1 => "Final".to_string(),
    2 => "Semifinals".to_string(),
    3 => "Quarterfinals".to_string(),
    _ => format!("Round of {}", 1usize << remaining),
  }
}

// ── Bracket ────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
  pub index: usize,
  pub label: String,
  pub slots: Vec<Slot>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSnapshot {
  pub size: usize,
  pub rounds: Vec<RoundView>,
  pub champion: Option<BracketEntrant>,
  pub complete: bool,
  pub decided_matches: usize,
  pub total_matches: usize,
  pub votes: VoteMap,
}

/// A seeded field plus the votes cast on it.
#[derive(Clone, Debug)]
pub struct Bracket {
  size: usize,
  round0: Vec<Slot>,
  votes: VoteMap,
}

impl Bracket {
  pub fn new(catalog: &[Game], size: usize, votes: VoteMap) -> Result<Self, String> {
    let round0 = seed(catalog, size)?;
    Ok(Bracket { size, round0, votes })
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn round0(&self) -> &[Slot] {
    &self.round0
  }

  pub fn votes(&self) -> &VoteMap {
    &self.votes
  }

  pub fn rounds(&self) -> Vec<Vec<Slot>> {
    compute_rounds(&self.round0, &self.votes)
  }

  pub fn champion(&self) -> Option<BracketEntrant> {
    champion(&self.rounds()).cloned()
  }

  pub fn vote(&mut self, round: usize, index: usize, game_id: &str) -> Result<VoteChange, String> {
    validate_match(self.size, round, index)?;
    let game_id = game_id.trim();
    if game_id.is_empty() {
      return Err(format!("Vote for match {round}-{index} needs a game id."));
    }
    Ok(self.votes.toggle(MatchKey::new(round, index), game_id))
  }

  pub fn reset(&mut self) {
    self.votes.clear();
  }

  pub fn snapshot(&self) -> BracketSnapshot {
    let rounds = self.rounds();
    let total_rounds = rounds.len().saturating_sub(1);
    let decided_matches = rounds
      .iter()
      .skip(1)
      .map(|round| round.iter().filter(|slot| slot.is_decided()).count())
      .sum();
    let champion = champion(&rounds).cloned();
    BracketSnapshot {
      size: self.size,
      complete: champion.is_some(),
      champion,
      decided_matches,
      total_matches: self.size - 1,
      votes: self.votes.clone(),
      rounds: rounds
        .into_iter()
        .enumerate()
        .map(|(index, slots)| RoundView {
          index,
          label: round_label(index, total_rounds),
          slots,
        })
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn game(id: &str, hype: u8) -> Game {
    Game {
      id: id.to_string(),
      title: format!("Game {id}"),
      slug: format!("game-{id}"),
      release_date: "2026-06-01".to_string(),
      platforms: vec!["PC".to_string()],
      genres: vec!["Action".to_string()],
      hype,
      image: None,
      summary: None,
      screenshots: Vec::new(),
      videos: Vec::new(),
      similar_games: Vec::new(),
      source: None,
    }
  }

  /// Ranks 1..=16 with hype 100 down to 85, ids `r1`..`r16`.
  fn ranked_catalog() -> Vec<Game> {
    // Shuffled on purpose so seeding has to sort.
    [9usize, 3, 16, 1, 12, 7, 5, 14, 2, 11, 8, 15, 4, 10, 6, 13]
      .iter()
      .map(|rank| game(&format!("r{rank}"), (101 - *rank) as u8))
      .collect()
  }

  fn ids(slots: &[Slot]) -> Vec<Option<&str>> {
    slots.iter().map(Slot::entrant_id).collect()
  }

  fn winner_of(rounds: &[Vec<Slot>], round: usize, index: usize) -> String {
    let pair = &rounds[round][index * 2..index * 2 + 2];
    let a = pair[0].entrant().unwrap();
    let b = pair[1].entrant().unwrap();
    if a.seed < b.seed { a.id.clone() } else { b.id.clone() }
  }

  #[test]
  fn seeds_standard_pairs() {
    let round0 = seed(&ranked_catalog(), 16).unwrap();
    let seeds: Vec<u32> = round0.iter().map(|slot| slot.entrant().unwrap().seed).collect();
    assert_eq!(seeds, vec![1, 16, 8, 9, 5, 12, 4, 13, 6, 11, 3, 14, 7, 10, 2, 15]);
    assert_eq!(round0[0].entrant_id(), Some("r1"));
    assert_eq!(round0[15].entrant_id(), Some("r15"));
    assert_eq!(round0[1].entrant_id(), Some("r16"));
  }

  #[test]
  fn top_two_seeds_sit_in_opposite_halves() {
    let round0 = seed(&ranked_catalog(), 16).unwrap();
    let first_half = ids(&round0[..8]);
    let second_half = ids(&round0[8..]);
    assert!(first_half.contains(&Some("r1")));
    assert!(second_half.contains(&Some("r2")));
  }

  #[test]
  fn seed_rejects_non_power_of_two() {
    assert!(seed(&ranked_catalog(), 12).is_err());
    assert!(seed(&ranked_catalog(), 0).is_err());
    assert!(seed(&ranked_catalog(), 1).is_err());
  }

  #[test]
  fn oversized_brackets_are_rejected() {
    assert!(validate_size(MAX_BRACKET_SIZE).is_ok());
    assert!(validate_size(MAX_BRACKET_SIZE * 2).is_err());
    assert!(Bracket::new(&ranked_catalog(), 1 << 40, VoteMap::new()).is_err());
    assert!(validate_match(1 << 40, 0, 0).is_err());
  }

  #[test]
  fn generic_sizes_use_recursive_layout() {
    assert_eq!(seed_order(4).unwrap(), vec![0, 3, 1, 2]);
    assert_eq!(seed_order(8).unwrap(), vec![0, 7, 3, 4, 1, 6, 2, 5]);
  }

  #[test]
  fn undersized_catalog_leaves_vacant_slots() {
    let catalog: Vec<Game> = (1..=12).map(|i| game(&format!("g{i}"), 100 - i as u8)).collect();
    let round0 = seed(&catalog, 16).unwrap();
    assert_eq!(round0.len(), 16);
    assert_eq!(round0.iter().filter(|slot| **slot == Slot::Vacant).count(), 4);
    // Seed 16 is missing, so seed 1 gets a bye.
    assert_eq!(round0[1], Slot::Vacant);
    let rounds = compute_rounds(&round0, &VoteMap::new());
    assert_eq!(rounds[1][0].entrant_id(), Some("g1"));
  }

  #[test]
  fn rounds_halve_down_to_the_final() {
    let bracket = Bracket::new(&ranked_catalog(), 16, VoteMap::new()).unwrap();
    let lengths: Vec<usize> = bracket.rounds().iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![16, 8, 4, 2, 1]);
  }

  #[test]
  fn vote_advances_the_chosen_entrant() {
    let mut bracket = Bracket::new(&ranked_catalog(), 16, VoteMap::new()).unwrap();
    assert_eq!(bracket.vote(0, 0, "r1").unwrap(), VoteChange::Recorded);
    let rounds = bracket.rounds();
    assert_eq!(rounds[1][0].entrant_id(), Some("r1"));
    assert_eq!(rounds[1][1], Slot::Pending);
    assert!(bracket.champion().is_none());
  }

  #[test]
  fn voting_twice_toggles_off() {
    let mut bracket = Bracket::new(&ranked_catalog(), 16, VoteMap::new()).unwrap();
    let before = bracket.votes().clone();
    bracket.vote(0, 3, "r4").unwrap();
    assert_eq!(bracket.vote(0, 3, "r4").unwrap(), VoteChange::Cleared);
    assert_eq!(bracket.votes(), &before);
  }

  #[test]
  fn switching_a_pick_drops_stale_downstream_winner() {
    let mut bracket = Bracket::new(&ranked_catalog(), 16, VoteMap::new()).unwrap();
    bracket.vote(0, 0, "r1").unwrap();
    bracket.vote(0, 1, "r8").unwrap();
    bracket.vote(1, 0, "r1").unwrap();
    assert_eq!(bracket.rounds()[2][0].entrant_id(), Some("r1"));

    bracket.vote(0, 0, "r16").unwrap();
    let rounds = bracket.rounds();
    assert_eq!(rounds[1][0].entrant_id(), Some("r16"));
    assert_eq!(rounds[2][0], Slot::Pending);
    // The stale vote is kept but no longer names an occupant.
    assert_eq!(bracket.votes().get(1, 0), Some("r1"));
  }

  #[test]
  fn champion_appears_only_after_all_fifteen_matches() {
    let mut bracket = Bracket::new(&ranked_catalog(), 16, VoteMap::new()).unwrap();
    let mut cast = 0;
    for round in 0..4 {
      let matches = 16 >> (round + 1);
      for index in 0..matches {
        assert!(bracket.champion().is_none());
        let winner = winner_of(&bracket.rounds(), round, index);
        bracket.vote(round, index, &winner).unwrap();
        cast += 1;
      }
    }
    assert_eq!(cast, 15);
    let snapshot = bracket.snapshot();
    assert!(snapshot.complete);
    assert_eq!(snapshot.champion.map(|c| c.id), Some("r1".to_string()));
    assert_eq!(snapshot.decided_matches, 15);
    assert_eq!(snapshot.total_matches, 15);
  }

  #[test]
  fn reset_collapses_later_rounds() {
    let mut bracket = Bracket::new(&ranked_catalog(), 16, VoteMap::new()).unwrap();
    bracket.vote(0, 0, "r1").unwrap();
    bracket.vote(0, 7, "r2").unwrap();
    bracket.reset();
    let rounds = bracket.rounds();
    assert!(rounds[0].iter().all(|slot| slot.entrant().is_some()));
    assert!(rounds[1..].iter().flatten().all(|slot| *slot == Slot::Pending));
  }

  #[test]
  fn out_of_range_votes_are_rejected() {
    let mut bracket = Bracket::new(&ranked_catalog(), 16, VoteMap::new()).unwrap();
    assert!(bracket.vote(4, 0, "r1").is_err());
    assert!(bracket.vote(0, 8, "r1").is_err());
    assert!(bracket.vote(3, 1, "r1").is_err());
    assert!(bracket.vote(3, 0, "r1").is_ok());
    assert!(bracket.vote(0, 0, "  ").is_err());
  }

  #[test]
  fn votes_for_non_occupants_are_ignored() {
    let mut votes = VoteMap::new();
    votes.toggle(MatchKey::new(0, 0), "r2");
    let round0 = seed(&ranked_catalog(), 16).unwrap();
    let rounds = compute_rounds(&round0, &votes);
    assert_eq!(rounds[1][0], Slot::Pending);
  }

  #[test]
  fn vote_map_serializes_with_string_keys() {
    let mut votes = VoteMap::new();
    votes.toggle(MatchKey::new(0, 3), "r4");
    votes.toggle(MatchKey::new(2, 1), "r2");
    let json = serde_json::to_string(&votes).unwrap();
    assert_eq!(json, r#"{"0-3":"r4","2-1":"r2"}"#);
    let parsed: VoteMap = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, votes);
    assert!(serde_json::from_str::<VoteMap>(r#"{"x":"r1"}"#).is_err());
  }

  #[test]
  fn single_game_catalog_is_its_own_champion() {
    let bracket = Bracket::new(&[game("solo", 50)], 16, VoteMap::new()).unwrap();
    assert_eq!(bracket.champion().map(|c| c.id), Some("solo".to_string()));
  }

  #[test]
  fn round_labels() {
    assert_eq!(round_label(0, 4), "Round of 16");
    assert_eq!(round_label(1, 4), "Quarterfinals");
    assert_eq!(round_label(2, 4), "Semifinals");
    assert_eq!(round_label(3, 4), "Final");
    assert_eq!(round_label(4, 4), "Champion");
  }
}
