use crate::bracket::{Bracket, VoteChange, VoteMap};
use crate::storage::StateStore;
use crate::types::{Game, TOP_FIVE_LIMIT};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

pub const WATCHLIST_KEY: &str = "watchlist";
pub const TOP_FIVE_KEY: &str = "top-five";
pub const TIER_LIST_KEY: &str = "tier-list";
pub const BRACKET_VOTES_KEY: &str = "bracket-votes";
pub const HYPE_VOTES_KEY: &str = "hype-votes";

// ── Watchlist ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watchlist {
    ids: Vec<String>,
}

impl Watchlist {
    /// Returns whether the game is watched after the toggle.
    pub fn toggle(&mut self, id: &str) -> bool {
        if let Some(pos) = self.ids.iter().position(|existing| existing == id) {
            self.ids.remove(pos);
            false
        } else {
            self.ids.push(id.to_string());
            true
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id_set(&self) -> HashSet<String> {
        self.ids.iter().cloned().collect()
    }
}

// ── Top five ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopFive {
    ids: Vec<String>,
}

impl TopFive {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn add(&mut self, id: &str) -> Result<(), String> {
        if self.ids.iter().any(|existing| existing == id) {
            return Err(format!("{id} is already in the top five."));
        }
        if self.ids.len() >= TOP_FIVE_LIMIT {
            return Err(format!("Top five is full ({TOP_FIVE_LIMIT} games)."));
        }
        self.ids.push(id.to_string());
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), String> {
        let len = self.ids.len();
        if from >= len || to >= len {
            return Err(format!("Cannot move top five entry {from} to {to}: list has {len} entries."));
        }
        let id = self.ids.remove(from);
        self.ids.insert(to, id);
        Ok(())
    }

    /// Drops duplicates and anything past the limit from a stored value.
    fn normalized(self) -> Self {
        let mut seen = HashSet::new();
        let ids = self
            .ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .take(TOP_FIVE_LIMIT)
            .collect();
        TopFive { ids }
    }
}

// ── Tier list ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
    D,
    F,
}

impl Tier {
    pub const ALL: [Tier; 6] = [Tier::S, Tier::A, Tier::B, Tier::C, Tier::D, Tier::F];

    pub fn parse(raw: &str) -> Option<Tier> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "S" => Some(Tier::S),
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            "D" => Some(Tier::D),
            "F" => Some(Tier::F),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierList {
    tiers: BTreeMap<Tier, Vec<String>>,
}

impl Default for TierList {
    fn default() -> Self {
        TierList {
            tiers: Tier::ALL.iter().map(|tier| (*tier, Vec::new())).collect(),
        }
    }
}

impl TierList {
    pub fn bucket(&self, tier: Tier) -> &[String] {
        self.tiers.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tier_of(&self, id: &str) -> Option<Tier> {
        self.tiers
            .iter()
            .find(|(_, ids)| ids.iter().any(|existing| existing == id))
            .map(|(tier, _)| *tier)
    }

    /// Drag and drop: pulls the game out of wherever it sits, then inserts it
    /// into `tier` at `index` (clamped). Returns the final position.
    pub fn place(&mut self, id: &str, tier: Tier, index: usize) -> usize {
        self.remove(id);
        let bucket = self.tiers.entry(tier).or_default();
        let index = index.min(bucket.len());
        bucket.insert(index, id.to_string());
        index
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let mut removed = false;
        for ids in self.tiers.values_mut() {
            let before = ids.len();
            ids.retain(|existing| existing != id);
            removed |= ids.len() != before;
        }
        removed
    }

    pub fn clear(&mut self) {
        *self = TierList::default();
    }

    /// Catalog games not placed in any tier, in catalog order.
    pub fn unranked<'a>(&self, catalog: &'a [Game]) -> Vec<&'a Game> {
        let placed: HashSet<&str> = self.tiers.values().flatten().map(String::as_str).collect();
        catalog
            .iter()
            .filter(|game| !placed.contains(game.id.as_str()))
            .collect()
    }
}

// ── Community hype votes ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HypeTally {
    pub upvotes: u32,
    pub downvotes: u32,
    pub user_vote: Option<VoteDirection>,
}

impl HypeTally {
    fn bump(&mut self, direction: VoteDirection, up: bool) {
        let counter = match direction {
            VoteDirection::Up => &mut self.upvotes,
            VoteDirection::Down => &mut self.downvotes,
        };
        *counter = if up { counter.saturating_add(1) } else { counter.saturating_sub(1) };
    }

    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HypeVotes {
    tallies: BTreeMap<String, HypeTally>,
}

impl HypeVotes {
    pub fn tally(&self, id: &str) -> HypeTally {
        self.tallies.get(id).cloned().unwrap_or_default()
    }

    /// Same direction twice retracts; the opposite direction switches.
    pub fn cast(&mut self, id: &str, direction: VoteDirection) -> HypeTally {
        let tally = self.tallies.entry(id.to_string()).or_default();
        match tally.user_vote {
            Some(previous) if previous == direction => {
                tally.bump(direction, false);
                tally.user_vote = None;
            }
            Some(previous) => {
                tally.bump(previous, false);
                tally.bump(direction, true);
                tally.user_vote = Some(direction);
            }
            None => {
                tally.bump(direction, true);
                tally.user_vote = Some(direction);
            }
        }
        tally.clone()
    }
}

// ── User state ─────────────────────────────────────────────────────────

/// Every per-user store, loaded once and written back key by key on each
/// mutation.
#[derive(Debug)]
pub struct UserState {
    store: StateStore,
    watchlist: Watchlist,
    top_five: TopFive,
    tier_list: TierList,
    hype_votes: HypeVotes,
    bracket_votes: VoteMap,
}

impl UserState {
    pub fn load(store: StateStore) -> Self {
        let state = UserState {
            watchlist: store.load(WATCHLIST_KEY),
            top_five: store.load::<TopFive>(TOP_FIVE_KEY).normalized(),
            tier_list: store.load(TIER_LIST_KEY),
            hype_votes: store.load(HYPE_VOTES_KEY),
            bracket_votes: store.load(BRACKET_VOTES_KEY),
            store,
        };
        info!(
            "Loaded user state from {} ({} watched, {} bracket votes)",
            state.store.dir().display(),
            state.watchlist.ids().len(),
            state.bracket_votes.len()
        );
        state
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    pub fn top_five(&self) -> &TopFive {
        &self.top_five
    }

    pub fn tier_list(&self) -> &TierList {
        &self.tier_list
    }

    pub fn hype_votes(&self) -> &HypeVotes {
        &self.hype_votes
    }

    pub fn bracket_votes(&self) -> &VoteMap {
        &self.bracket_votes
    }

    pub fn toggle_watch(&mut self, id: &str) -> Result<bool, String> {
        let mut watchlist = self.watchlist.clone();
        let watched = watchlist.toggle(id);
        self.store.save(WATCHLIST_KEY, &watchlist)?;
        self.watchlist = watchlist;
        Ok(watched)
    }

    pub fn add_top_five(&mut self, id: &str) -> Result<(), String> {
        let mut top_five = self.top_five.clone();
        top_five.add(id)?;
        self.store.save(TOP_FIVE_KEY, &top_five)?;
        self.top_five = top_five;
        Ok(())
    }

    pub fn remove_top_five(&mut self, id: &str) -> Result<bool, String> {
        let mut top_five = self.top_five.clone();
        if !top_five.remove(id) {
            return Ok(false);
        }
        self.store.save(TOP_FIVE_KEY, &top_five)?;
        self.top_five = top_five;
        Ok(true)
    }

    pub fn move_top_five(&mut self, from: usize, to: usize) -> Result<(), String> {
        let mut top_five = self.top_five.clone();
        top_five.move_item(from, to)?;
        self.store.save(TOP_FIVE_KEY, &top_five)?;
        self.top_five = top_five;
        Ok(())
    }

    pub fn place_tier(&mut self, id: &str, tier: Tier, index: usize) -> Result<usize, String> {
        let mut tier_list = self.tier_list.clone();
        let index = tier_list.place(id, tier, index);
        self.store.save(TIER_LIST_KEY, &tier_list)?;
        self.tier_list = tier_list;
        Ok(index)
    }

    pub fn remove_tier(&mut self, id: &str) -> Result<bool, String> {
        let mut tier_list = self.tier_list.clone();
        if !tier_list.remove(id) {
            return Ok(false);
        }
        self.store.save(TIER_LIST_KEY, &tier_list)?;
        self.tier_list = tier_list;
        Ok(true)
    }

    pub fn clear_tiers(&mut self) -> Result<(), String> {
        let mut tier_list = self.tier_list.clone();
        tier_list.clear();
        self.store.save(TIER_LIST_KEY, &tier_list)?;
        self.tier_list = tier_list;
        Ok(())
    }

    pub fn cast_hype(&mut self, id: &str, direction: VoteDirection) -> Result<HypeTally, String> {
        let mut hype_votes = self.hype_votes.clone();
        let tally = hype_votes.cast(id, direction);
        self.store.save(HYPE_VOTES_KEY, &hype_votes)?;
        self.hype_votes = hype_votes;
        Ok(tally)
    }

    pub fn bracket(&self, catalog: &[Game], size: usize) -> Result<Bracket, String> {
        Bracket::new(catalog, size, self.bracket_votes.clone())
    }

    pub fn bracket_vote(
        &mut self,
        catalog: &[Game],
        size: usize,
        round: usize,
        index: usize,
        game_id: &str,
    ) -> Result<(VoteChange, Bracket), String> {
        let mut bracket = self.bracket(catalog, size)?;
        let change = bracket.vote(round, index, game_id)?;
        self.store.save(BRACKET_VOTES_KEY, bracket.votes())?;
        self.bracket_votes = bracket.votes().clone();
        Ok((change, bracket))
    }

    pub fn reset_bracket(&mut self) -> Result<(), String> {
        self.store.remove(BRACKET_VOTES_KEY)?;
        self.bracket_votes.clear();
        Ok(())
    }
}
