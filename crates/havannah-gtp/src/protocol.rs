//! Command dispatch
//!
//! A GTP-style line protocol: one command per line, `=` responses on
//! success, `?` on failure, a blank line terminating each response.
//! The solvers and the game state live here; the I/O loop in `main`
//! only shuttles lines back and forth.

use log::{info, warn};

use havannah_core::board::InvalidSize;
use havannah_core::{Coords, LbDists, Move, Player, Solution, SolverAb, SolverDfpn};

use crate::game::Game;

const DEFAULT_AB_DEPTH: i32 = 40;

/// One protocol response.
pub struct Response {
    pub success: bool,
    pub body: String,
    pub quit: bool,
}

impl Response {
    fn ok(body: impl Into<String>) -> Response {
        Response {
            success: true,
            body: body.into(),
            quit: false,
        }
    }

    fn err(body: impl Into<String>) -> Response {
        Response {
            success: false,
            body: body.into(),
            quit: false,
        }
    }

    pub fn render(&self) -> String {
        let prefix = if self.success { '=' } else { '?' };
        if self.body.is_empty() {
            format!("{prefix}\n\n")
        } else {
            format!("{prefix} {}\n\n", self.body)
        }
    }
}

/// The engine behind the protocol: session state plus both solvers.
pub struct Engine {
    game: Game,
    solver_ab: SolverAb,
    solver_dfpn: SolverDfpn,
    coords: Coords,
    verbose: bool,
    time_limit: f64,
    mem_mib: u64,
}

impl Engine {
    pub fn new(
        size: u8,
        mem_mib: u64,
        time_limit: f64,
        coords: Coords,
    ) -> Result<Engine, InvalidSize> {
        let game = Game::new(size)?;
        let solver_dfpn = SolverDfpn::new(game.board().clone());
        Ok(Engine {
            game,
            solver_ab: SolverAb::new(),
            solver_dfpn,
            coords,
            verbose: false,
            time_limit,
            mem_mib,
        })
    }

    /// Dispatch one input line; blank lines produce no response.
    pub fn handle(&mut self, line: &str) -> Option<Response> {
        let mut tokens = line.split_whitespace();
        let cmd = tokens.next()?;
        let args: Vec<&str> = tokens.collect();

        Some(match cmd {
            "quit" | "exit" => Response {
                success: true,
                body: String::new(),
                quit: true,
            },
            "name" => Response::ok("havannah"),
            "version" => Response::ok(env!("CARGO_PKG_VERSION")),
            "boardsize" => self.cmd_boardsize(&args),
            "clear_board" => self.cmd_clear_board(),
            "play" => self.cmd_play(&args),
            "white" => self.cmd_play_colour(&args, Player::P1),
            "black" => self.cmd_play_colour(&args, Player::P2),
            "playgame" => self.cmd_playgame(&args),
            "undo" => self.cmd_undo(&args),
            "genmove" => self.cmd_genmove(&args),
            "all_legal" => self.cmd_all_legal(),
            "history" => self.cmd_history(),
            "winner" | "havannah_winner" => Response::ok(self.game.board().won().to_string()),
            "print" | "showboard" => Response::ok(format!("\n{}", self.game.board())),
            "dists" => self.cmd_dists(),
            "debug" => self.cmd_debug(),
            "lbdist" => {
                self.solver_dfpn.use_lbdist = match args.first() {
                    Some(&"0") | Some(&"false") => false,
                    Some(_) => true,
                    None => !self.solver_dfpn.use_lbdist,
                };
                Response::ok(format!("Lower-bound weights {}", self.solver_dfpn.use_lbdist))
            }
            "hguicoords" => {
                self.coords = Coords::HexGui;
                Response::ok("")
            }
            "gridcoords" => {
                self.coords = Coords::Grid;
                Response::ok("")
            }
            "verbose" => {
                self.verbose = match args.first() {
                    Some(&"0") | Some(&"false") => false,
                    Some(_) => true,
                    None => !self.verbose,
                };
                Response::ok(format!("Verbose {}", self.verbose))
            }
            "time" => self.cmd_time(&args),
            "mem" => self.cmd_mem(&args),
            "solve_ab" => self.cmd_solve_ab(&args),
            "solve_dfpnsab" => self.cmd_solve_dfpnsab(&args),
            _ => Response::err(format!("unknown command: {cmd}")),
        })
    }

    fn parse_move(&self, s: &str) -> Result<Move, String> {
        Move::parse(s, self.game.size(), self.coords).map_err(|e| e.to_string())
    }

    fn move_str(&self, m: Move) -> String {
        m.to_coord_string(self.game.size(), self.coords)
    }

    /// Point the proof-number solver at the session board again after
    /// anything other than a forward move.
    fn sync_solver(&mut self) {
        self.solver_dfpn.set_board(self.game.board().clone());
    }

    fn cmd_boardsize(&mut self, args: &[&str]) -> Response {
        let Some(arg) = args.first() else {
            return Response::err(format!("Current board size: {}", self.game.size()));
        };
        let size: u8 = match arg.parse() {
            Ok(n) => n,
            Err(_) => return Response::err(format!("Bad board size: {arg}")),
        };
        match Game::new(size) {
            Ok(game) => {
                info!("boardsize {size}");
                self.game = game;
                self.sync_solver();
                Response::ok("")
            }
            Err(e) => Response::err(e.to_string()),
        }
    }

    fn cmd_clear_board(&mut self) -> Response {
        self.game.clear();
        self.sync_solver();
        info!("clear_board");
        Response::ok("")
    }

    fn cmd_play(&mut self, args: &[&str]) -> Response {
        if args.len() != 2 {
            return Response::err("Wrong number of arguments");
        }
        let Some(colour) = parse_colour(args[0]) else {
            return Response::err("Invalid player selection");
        };
        self.play(args[1], colour)
    }

    fn cmd_play_colour(&mut self, args: &[&str], colour: Player) -> Response {
        if args.len() != 1 {
            return Response::err("Wrong number of arguments");
        }
        self.play(args[0], colour)
    }

    fn cmd_playgame(&mut self, args: &[&str]) -> Response {
        let mut ret = Response::ok("");
        for pos in args {
            ret = self.play(pos, self.game.to_play());
            if !ret.success {
                break;
            }
        }
        ret
    }

    fn play(&mut self, pos: &str, colour: Player) -> Response {
        if colour != self.game.to_play() {
            return Response::err("It is the other player's turn!");
        }
        if self.game.board().won().is_decided() {
            return Response::err("The game is already over");
        }
        let m = match self.parse_move(pos) {
            Ok(m) => m,
            Err(e) => return Response::err(e),
        };
        if !self.game.valid(m) {
            return Response::err("Invalid move");
        }

        self.game.play(m);
        self.solver_dfpn.play(m);
        info!("play {colour} {}", self.move_str(m));

        if self.verbose {
            Response::ok(format!(
                "Placement: {}, outcome: {}\n{}",
                self.move_str(m),
                self.game.board().won(),
                self.game.board()
            ))
        } else {
            Response::ok("")
        }
    }

    fn cmd_undo(&mut self, args: &[&str]) -> Response {
        let n: usize = match args.first() {
            Some(arg) => match arg.parse() {
                Ok(n) => n,
                Err(_) => return Response::err(format!("Bad undo count: {arg}")),
            },
            None => 1,
        };
        self.game.undo(n);
        self.sync_solver();
        info!("undo {n}");
        if self.verbose {
            Response::ok(format!("\n{}", self.game.board()))
        } else {
            Response::ok("")
        }
    }

    fn cmd_genmove(&mut self, args: &[&str]) -> Response {
        if let Some(arg) = args.first() {
            match parse_colour(arg) {
                Some(c) if c == self.game.to_play() => {}
                Some(_) => return Response::err("It is the other player's turn!"),
                None => return Response::err("Invalid player selection"),
            }
        }
        if self.game.board().won().is_decided() {
            return Response::err("The game is already over");
        }

        let outcome = self.solver_dfpn.solve(self.time_limit, self.mem_mib);
        info!("genmove solved as {outcome}");

        let m = match self.solver_dfpn.best_move {
            Some(m) => m,
            None => {
                warn!("position unsolved, playing the first legal move");
                match self.game.board().moves().next() {
                    Some(m) => m,
                    None => return Response::err("No legal moves"),
                }
            }
        };

        self.game.play(m);
        self.solver_dfpn.play(m);
        Response::ok(self.move_str(m))
    }

    fn cmd_all_legal(&self) -> Response {
        let moves: Vec<String> = self
            .game
            .board()
            .moves()
            .map(|m| self.move_str(m))
            .collect();
        Response::ok(moves.join(" "))
    }

    fn cmd_history(&self) -> Response {
        let hist: Vec<String> = self.game.hist().iter().map(|&m| self.move_str(m)).collect();
        Response::ok(hist.join(" "))
    }

    fn cmd_dists(&self) -> Response {
        let board = self.game.board();
        let dists = LbDists::new(board);
        let size = board.size() as i8;
        let size_d = board.diameter() as i8;

        let mut s = String::from("\n");
        s.push_str(&" ".repeat(size as usize + 4));
        for i in 1..=size {
            s.push_str(&format!("{i} "));
        }
        s.push('\n');

        for y in 0..size_d {
            s.push_str(&" ".repeat((size - 1 - y).unsigned_abs() as usize + 2));
            s.push((b'A' + y as u8) as char);
            s.push(' ');
            for x in board.line_start(y)..board.line_end(y) {
                let m = Move::new(x, y);
                match board.get(m) {
                    Some(Player::P1) => s.push('W'),
                    Some(Player::P2) => s.push('B'),
                    None => {
                        let d = dists.get(m);
                        if d < 10 {
                            s.push_str(&d.to_string());
                        } else {
                            s.push('.');
                        }
                    }
                }
                s.push(' ');
            }
            if y < size - 1 {
                s.push_str(&(1 + size + y).to_string());
            }
            s.push('\n');
        }
        Response::ok(s)
    }

    fn cmd_debug(&self) -> Response {
        let board = self.game.board();
        Response::ok(format!(
            "\nBoard size:  {}\nBoard cells: {}\nBoard vec:   {}\nBoard mem:   {}\n",
            board.size(),
            board.num_cells(),
            board.vec_size(),
            board.mem_size()
        ))
    }

    fn cmd_time(&mut self, args: &[&str]) -> Response {
        if let Some(arg) = args.first() {
            match arg.parse::<f64>() {
                Ok(t) if t >= 0.0 => self.time_limit = t,
                _ => return Response::err(format!("Bad time limit: {arg}")),
            }
        }
        Response::ok(format!("Time limit: {} s", self.time_limit))
    }

    fn cmd_mem(&mut self, args: &[&str]) -> Response {
        if let Some(arg) = args.first() {
            match arg.parse::<u64>() {
                Ok(m) => self.mem_mib = m,
                Err(_) => return Response::err(format!("Bad memory limit: {arg}")),
            }
        }
        Response::ok(format!("Memory limit: {} MiB", self.mem_mib))
    }

    fn cmd_solve_ab(&mut self, args: &[&str]) -> Response {
        let time = match parse_or(args.first(), self.time_limit) {
            Ok(t) => t,
            Err(e) => return Response::err(e),
        };
        let depth = match parse_or(args.get(1), DEFAULT_AB_DEPTH) {
            Ok(d) => d,
            Err(e) => return Response::err(e),
        };

        let outcome = self.solver_ab.solve(self.game.board(), time, depth);
        Response::ok(self.solution_str(outcome, self.solver_ab.best_move))
    }

    fn cmd_solve_dfpnsab(&mut self, args: &[&str]) -> Response {
        let time = match parse_or(args.first(), self.time_limit) {
            Ok(t) => t,
            Err(e) => return Response::err(e),
        };
        let mem = match parse_or(args.get(1), self.mem_mib) {
            Ok(m) => m,
            Err(e) => return Response::err(e),
        };

        let outcome = self.solver_dfpn.solve(time, mem);
        Response::ok(self.solution_str(outcome, self.solver_dfpn.best_move))
    }

    fn solution_str(&self, outcome: Solution, best: Option<Move>) -> String {
        match best {
            Some(m) => format!("{outcome} {}", self.move_str(m)),
            None => outcome.to_string(),
        }
    }
}

fn parse_colour(s: &str) -> Option<Player> {
    match s.to_ascii_lowercase().as_str() {
        "w" | "white" | "1" => Some(Player::P1),
        "b" | "black" | "2" => Some(Player::P2),
        _ => None,
    }
}

fn parse_or<T: std::str::FromStr>(arg: Option<&&str>, default: T) -> Result<T, String> {
    match arg {
        Some(s) => s.parse().map_err(|_| format!("Bad argument: {s}")),
        None => Ok(default),
    }
}
