#![no_std]

//! # Wagered Tic-Tac-Toe
//!
//! A two-player tic-tac-toe match with an escrowed stake.
//!
//! ## Match flow
//! 1. Player X calls `create_match`, depositing a stake into the contract.
//! 2. Player O calls `join_match`, depositing exactly the same stake.
//! 3. Players alternate `make_move` calls, X first.
//! 4. The move that completes a line (or fills the board) settles the match
//!    in the same invocation:
//!    - a win pays the whole pot to the winner;
//!    - a draw pays `pot / 2` to X and the rest of the pot to O.
//!
//! ## Board encoding
//! `board[i]` is row `i / 3`, column `i % 3`. Lines are scanned in a fixed
//! order (rows, columns, diagonals) and the first complete line decides.
//!
//! ## Escrow
//! The stake token is fixed at deploy time. The contract's own balance of that
//! token is the escrow; each match tracks its share in `pot`, which is zero
//! once the match has a terminal status.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, log, token, Address,
    BytesN, Env, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvMatchCreated {
    pub match_id: u32,
    pub creator: Address,
    pub stake: i128,
}

#[contractevent]
pub struct EvPlayerJoined {
    pub match_id: u32,
    pub joiner: Address,
    pub stake: i128,
}

#[contractevent]
pub struct EvMoveMade {
    pub match_id: u32,
    pub player: Address,
    pub position: u32,
}

/// Emitted once per match, by the move that ends it.
/// `payout` is the full pot for a win and X's half for a draw.
#[contractevent]
pub struct EvMatchResolved {
    pub match_id: u32,
    pub winner: Option<Address>,
    pub status: Status,
    pub payout: i128,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum TicTacToeError {
    MatchNotFound = 1,
    AlreadyJoined = 2,
    InvalidStake = 3,
    NotStarted = 4,
    GameOver = 5,
    OutOfTurn = 6,
    InvalidPosition = 7,
    CellTaken = 8,
    NotDecided = 9,
    AdminNotSet = 10,
    TokenNotSet = 11,
    StakeOverflow = 12,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Match state & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Cell {
    Empty = 0,
    X = 1,
    O = 2,
}

#[contracttype]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Status {
    InProgress = 0,
    XWon = 1,
    OWon = 2,
    Draw = 3,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Match {
    pub id: u32,
    pub board: Vec<Cell>,
    pub player_x: Address,
    pub player_o: Option<Address>,
    pub current_turn: Address,
    pub status: Status,
    /// Escrowed balance owned by this match.
    pub pot: i128,
    /// Per-player contribution, fixed by the creator's deposit.
    pub stake: i128,
    pub moves: u32,
    pub created_ledger: u32,
}

/// Compact summary of a finished match, stored persistently per player.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MatchSummary {
    pub match_id: u32,
    pub opponent: Address,
    pub outcome: u32, // 1=win, 2=loss, 3=draw (from this player's perspective)
    pub payout: i128,
    pub ledger: u32, // ledger sequence when the match ended
}

#[contracttype]
#[derive(Clone)]
enum StorageKey {
    Match(u32),
    Admin,
    Token,
    /// Number of matches ever created; the last allocated id.
    MatchCount,
    /// Ids of created-but-unjoined matches, oldest first.
    OpenMatches,
    PlayerHistory(Address),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

pub const BOARD_SIZE: u32 = 9;

/// Rows, then columns, then diagonals. Scan order is the tie-break.
pub const WINNING_LINES: [[u32; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

pub const OUTCOME_WIN: u32 = 1;
pub const OUTCOME_LOSS: u32 = 2;
pub const OUTCOME_DRAW: u32 = 3;

const MAX_OPEN_MATCHES: u32 = 50;
const MAX_HISTORY_PER_PLAYER: u32 = 50;

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// Matches hold escrowed funds, so they live in persistent storage (30 days).
const MATCH_TTL_SECONDS: u32 = 30 * 24 * 60 * 60;
const MATCH_TTL_LEDGERS: u32 = MATCH_TTL_SECONDS / LEDGER_RATE_SECS; // 518,400 ledgers

// History TTL: 120 days
const HISTORY_TTL_SECONDS: u32 = 120 * 24 * 60 * 60;
const HISTORY_TTL_LEDGERS: u32 = HISTORY_TTL_SECONDS / LEDGER_RATE_SECS; // 2,073,600 ledgers

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct TicTacToeContract;

#[contractimpl]
impl TicTacToeContract {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Constructor & Lifecycle
    // ───────────────────────────────────────────────────────────────────────────

    /// `token` is the asset every stake is paid in. It cannot be changed later.
    pub fn __constructor(env: Env, admin: Address, token: Address) {
        env.storage().instance().set(&StorageKey::Admin, &admin);
        env.storage().instance().set(&StorageKey::Token, &token);
        env.storage().instance().set(&StorageKey::MatchCount, &0u32);
    }

    /// Open a new match with `caller` as X. The deposit becomes the match stake.
    pub fn create_match(env: Env, caller: Address, stake: i128) -> Result<u32, TicTacToeError> {
        caller.require_auth();

        if stake <= 0 {
            return Err(TicTacToeError::InvalidStake);
        }

        Self::deposit(&env, &caller, stake)?;

        let match_id = Self::allocate_id(&env);
        let game = Match {
            id: match_id,
            board: Vec::from_array(&env, [Cell::Empty; BOARD_SIZE as usize]),
            player_x: caller.clone(),
            player_o: None,
            current_turn: caller.clone(),
            status: Status::InProgress,
            pot: stake,
            stake,
            moves: 0,
            created_ledger: env.ledger().sequence(),
        };

        Self::list_open(&env, match_id);

        EvMatchCreated {
            match_id,
            creator: caller,
            stake,
        }
        .publish(&env);

        Self::write_match(&env, &game);
        Ok(match_id)
    }

    /// Take the O seat by depositing exactly the match stake.
    pub fn join_match(
        env: Env,
        match_id: u32,
        caller: Address,
        stake: i128,
    ) -> Result<(), TicTacToeError> {
        caller.require_auth();

        let mut game = Self::read_match(&env, match_id)?;
        if game.player_o.is_some() {
            return Err(TicTacToeError::AlreadyJoined);
        }
        if caller == game.player_x {
            return Err(TicTacToeError::AlreadyJoined);
        }
        if stake != game.stake {
            return Err(TicTacToeError::InvalidStake);
        }
        let pot = game
            .pot
            .checked_add(stake)
            .ok_or(TicTacToeError::StakeOverflow)?;

        Self::deposit(&env, &caller, stake)?;

        game.pot = pot;
        game.player_o = Some(caller.clone());
        Self::delist_open(&env, match_id);

        EvPlayerJoined {
            match_id,
            joiner: caller,
            stake,
        }
        .publish(&env);

        Self::write_match(&env, &game);
        Ok(())
    }

    /// Place the caller's mark at `position` (0-8) and settle the match if
    /// the move completes a line or fills the board.
    pub fn make_move(
        env: Env,
        match_id: u32,
        caller: Address,
        position: u32,
    ) -> Result<(), TicTacToeError> {
        caller.require_auth();

        let mut game = Self::read_match(&env, match_id)?;
        let player_o = game.player_o.clone().ok_or(TicTacToeError::NotStarted)?;
        if game.status != Status::InProgress {
            return Err(TicTacToeError::GameOver);
        }
        if caller != game.current_turn {
            return Err(TicTacToeError::OutOfTurn);
        }
        if position >= BOARD_SIZE {
            return Err(TicTacToeError::InvalidPosition);
        }
        if Self::cell_at(&game.board, position) != Cell::Empty {
            return Err(TicTacToeError::CellTaken);
        }

        let (mark, next) = if caller == game.player_x {
            (Cell::X, player_o.clone())
        } else {
            (Cell::O, game.player_x.clone())
        };
        game.board.set(position, mark);
        game.moves += 1;

        EvMoveMade {
            match_id,
            player: caller,
            position,
        }
        .publish(&env);

        game.current_turn = next;
        Self::evaluate_outcome(&env, &mut game, player_o)?;

        Self::write_match(&env, &game);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Read & Admin
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_status(env: Env, match_id: u32) -> Result<Status, TicTacToeError> {
        Ok(Self::read_match(&env, match_id)?.status)
    }

    /// Address of the winning participant. Fails with `NotDecided` while the
    /// match is in progress or after a draw.
    pub fn get_winner(env: Env, match_id: u32) -> Result<Address, TicTacToeError> {
        let game = Self::read_match(&env, match_id)?;
        match game.status {
            Status::XWon => Ok(game.player_x),
            Status::OWon => game.player_o.ok_or(TicTacToeError::NotDecided),
            _ => Err(TicTacToeError::NotDecided),
        }
    }

    pub fn get_match(env: Env, match_id: u32) -> Result<Match, TicTacToeError> {
        Self::read_match(&env, match_id)
    }

    pub fn get_board(env: Env, match_id: u32) -> Result<Vec<Cell>, TicTacToeError> {
        Ok(Self::read_match(&env, match_id)?.board)
    }

    /// Ids of matches waiting for a second player, oldest first.
    /// Only the most recent 50 are listed; older ones stay joinable by id.
    pub fn get_open_matches(env: Env) -> Vec<u32> {
        env.storage()
            .instance()
            .get(&StorageKey::OpenMatches)
            .unwrap_or_else(|| Vec::new(&env))
    }

    pub fn match_count(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&StorageKey::MatchCount)
            .unwrap_or(0)
    }

    /// Get a player's match history (up to 50 most recent matches).
    /// Outcome is from the player's perspective: 1 = win, 2 = loss, 3 = draw.
    pub fn get_player_history(env: Env, player: Address) -> Vec<MatchSummary> {
        let key = StorageKey::PlayerHistory(player);
        env.storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| Vec::new(&env))
    }

    pub fn get_admin(env: Env) -> Result<Address, TicTacToeError> {
        Self::load_admin(&env)
    }

    pub fn set_admin(env: Env, new_admin: Address) -> Result<(), TicTacToeError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage().instance().set(&StorageKey::Admin, &new_admin);
        Ok(())
    }

    pub fn get_token(env: Env) -> Result<Address, TicTacToeError> {
        Self::load_token(&env)
    }

    pub fn upgrade(env: Env, new_wasm_hash: BytesN<32>) -> Result<(), TicTacToeError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.deployer().update_current_contract_wasm(new_wasm_hash);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Outcome evaluation & settlement
    // ═══════════════════════════════════════════════════════════════════════════

    fn evaluate_outcome(
        env: &Env,
        game: &mut Match,
        player_o: Address,
    ) -> Result<(), TicTacToeError> {
        let status = match Self::winning_mark(&game.board) {
            Some(Cell::X) => Status::XWon,
            Some(_) => Status::OWon,
            None if Self::board_full(&game.board) => Status::Draw,
            None => return Ok(()),
        };
        Self::finalize_match(env, game, player_o, status)
    }

    /// Mark of the first complete line in `WINNING_LINES` order, if any.
    fn winning_mark(board: &Vec<Cell>) -> Option<Cell> {
        for [a, b, c] in WINNING_LINES {
            let mark = Self::cell_at(board, a);
            if mark != Cell::Empty
                && mark == Self::cell_at(board, b)
                && mark == Self::cell_at(board, c)
            {
                return Some(mark);
            }
        }
        None
    }

    fn board_full(board: &Vec<Cell>) -> bool {
        board.iter().all(|cell| cell != Cell::Empty)
    }

    /// Split a drawn pot: X receives the floor half, O everything left.
    fn draw_split(pot: i128) -> (i128, i128) {
        let half = pot / 2;
        (half, pot - half)
    }

    /// Single settlement call-site: sets the terminal status, empties the pot
    /// and records both players' history. Only reached from an in-progress
    /// match that `make_move` has already validated.
    fn finalize_match(
        env: &Env,
        game: &mut Match,
        player_o: Address,
        status: Status,
    ) -> Result<(), TicTacToeError> {
        let pot = game.pot;

        let (winner, payout) = match status {
            Status::XWon | Status::OWon => {
                let (winner, loser) = if status == Status::XWon {
                    (game.player_x.clone(), player_o)
                } else {
                    (player_o, game.player_x.clone())
                };
                Self::payout(env, &winner, pot)?;
                Self::save_player_history(env, game.id, &winner, &loser, OUTCOME_WIN, pot);
                Self::save_player_history(env, game.id, &loser, &winner, OUTCOME_LOSS, 0);
                (Some(winner), pot)
            }
            _ => {
                let (to_x, to_o) = Self::draw_split(pot);
                Self::payout(env, &game.player_x, to_x)?;
                Self::payout(env, &player_o, to_o)?;
                Self::save_player_history(env, game.id, &game.player_x, &player_o, OUTCOME_DRAW, to_x);
                Self::save_player_history(env, game.id, &player_o, &game.player_x, OUTCOME_DRAW, to_o);
                (None, to_x)
            }
        };

        game.status = status;
        game.pot = 0;

        log!(env, "match resolved", game.id, status, pot);

        EvMatchResolved {
            match_id: game.id,
            winner,
            status,
            payout,
        }
        .publish(env);

        Ok(())
    }

    /// Append a match summary to a player's persistent history (ring buffer, max 50).
    fn save_player_history(
        env: &Env,
        match_id: u32,
        player: &Address,
        opponent: &Address,
        outcome: u32,
        payout: i128,
    ) {
        let key = StorageKey::PlayerHistory(player.clone());
        let mut history: Vec<MatchSummary> = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| Vec::new(env));

        while history.len() >= MAX_HISTORY_PER_PLAYER {
            history.remove(0);
        }

        history.push_back(MatchSummary {
            match_id,
            opponent: opponent.clone(),
            outcome,
            payout,
            ledger: env.ledger().sequence(),
        });

        env.storage().persistent().set(&key, &history);
        env.storage()
            .persistent()
            .extend_ttl(&key, HISTORY_TTL_LEDGERS, HISTORY_TTL_LEDGERS);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Escrow
    // ═══════════════════════════════════════════════════════════════════════════

    fn deposit(env: &Env, from: &Address, amount: i128) -> Result<(), TicTacToeError> {
        let token_addr = Self::load_token(env)?;
        let token_client = token::Client::new(env, &token_addr);
        token_client.transfer(from, &env.current_contract_address(), &amount);
        Ok(())
    }

    fn payout(env: &Env, to: &Address, amount: i128) -> Result<(), TicTacToeError> {
        if amount <= 0 {
            return Ok(());
        }
        let token_addr = Self::load_token(env)?;
        let token_client = token::Client::new(env, &token_addr);
        token_client.transfer(&env.current_contract_address(), to, &amount);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Lobby
    // ═══════════════════════════════════════════════════════════════════════════

    fn allocate_id(env: &Env) -> u32 {
        let count: u32 = env
            .storage()
            .instance()
            .get(&StorageKey::MatchCount)
            .unwrap_or(0);
        let match_id = count + 1;
        env.storage()
            .instance()
            .set(&StorageKey::MatchCount, &match_id);
        match_id
    }

    fn list_open(env: &Env, match_id: u32) {
        let mut open: Vec<u32> = env
            .storage()
            .instance()
            .get(&StorageKey::OpenMatches)
            .unwrap_or_else(|| Vec::new(env));

        while open.len() >= MAX_OPEN_MATCHES {
            open.remove(0);
        }
        open.push_back(match_id);

        env.storage().instance().set(&StorageKey::OpenMatches, &open);
    }

    fn delist_open(env: &Env, match_id: u32) {
        let mut open: Vec<u32> = env
            .storage()
            .instance()
            .get(&StorageKey::OpenMatches)
            .unwrap_or_else(|| Vec::new(env));

        let mut found_idx: Option<u32> = None;
        for (i, id) in open.iter().enumerate() {
            if id == match_id {
                found_idx = Some(i as u32);
                break;
            }
        }
        if let Some(idx) = found_idx {
            open.remove(idx);
            env.storage().instance().set(&StorageKey::OpenMatches, &open);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn cell_at(board: &Vec<Cell>, position: u32) -> Cell {
        board.get(position).unwrap_or(Cell::Empty)
    }

    fn read_match(env: &Env, match_id: u32) -> Result<Match, TicTacToeError> {
        env.storage()
            .persistent()
            .get(&StorageKey::Match(match_id))
            .ok_or(TicTacToeError::MatchNotFound)
    }

    fn write_match(env: &Env, game: &Match) {
        let key = StorageKey::Match(game.id);
        env.storage().persistent().set(&key, game);
        env.storage()
            .persistent()
            .extend_ttl(&key, MATCH_TTL_LEDGERS, MATCH_TTL_LEDGERS);
        // Keep instance storage (admin, token, lobby) alive
        env.storage()
            .instance()
            .extend_ttl(MATCH_TTL_LEDGERS, MATCH_TTL_LEDGERS);
    }

    fn load_admin(env: &Env) -> Result<Address, TicTacToeError> {
        env.storage()
            .instance()
            .get(&StorageKey::Admin)
            .ok_or(TicTacToeError::AdminNotSet)
    }

    fn load_token(env: &Env) -> Result<Address, TicTacToeError> {
        env.storage()
            .instance()
            .get(&StorageKey::Token)
            .ok_or(TicTacToeError::TokenNotSet)
    }
}
