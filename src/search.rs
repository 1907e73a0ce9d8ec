//! Depth-first search over symbolic states.
//!
//! The driver keeps one [`ConstraintStore`] and an explicit stack of choice
//! points, one per expanded state on the current path. Each choice point
//! remembers the store [`Mark`] of its state and the moves not yet tried;
//! trying the next move rolls the store back to that mark first, so
//! backtracking is chronological and never copies the store.
//!
//! Every visited node goes through three outcomes in fixed order:
//!
//! 1. **Report**: two processes critical; a [`Witness`] is recorded and the
//!    node is not expanded.
//! 2. **Prune**: the [`Table`] says the node's region is covered.
//! 3. **Expand**: the region is recorded, then every move is tried.
//!
//! Budgets are checked cooperatively. The state budget is checked before a
//! node is counted, the time budget before and during the tabling lookup,
//! and the depth budget just before expansion. A depth cut only ends its
//! branch; time and state budgets stop the whole search.

use std::cmp::max;
use std::fmt;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use crate::error::{CheckError, EncodingError, StoreError};
use crate::model::{BakeryModel, Move};
use crate::property::{critical_processes, violates_mutex};
use crate::state::{Region, SymbolicState};
use crate::store::{ConstraintStore, Mark};
use crate::table::{Coverage, Subsumption, Table};
use crate::trace::{Silent, TraceSink};
use crate::types::ProcessId;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CheckerConfig {
    /// Number of processes (`N`).
    pub processes: usize,
    /// Transitions from the initial state beyond which nothing is expanded.
    pub max_depth: Option<usize>,
    pub time_limit: Option<Duration>,
    /// Most nodes the search may visit; needing one more gives up.
    pub max_states: Option<usize>,
    pub subsumption: Subsumption,
    pub stop_at_first_violation: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            processes: 2,
            max_depth: None,
            time_limit: None,
            max_states: None,
            subsumption: Subsumption::default(),
            stop_at_first_violation: true,
        }
    }
}

impl CheckerConfig {
    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = Some(max_states);
        self
    }

    pub fn with_subsumption(mut self, subsumption: Subsumption) -> Self {
        self.subsumption = subsumption;
        self
    }

    pub fn with_stop_at_first_violation(mut self, stop: bool) -> Self {
        self.stop_at_first_violation = stop;
        self
    }
}

/// The budget that cut a search short.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Budget {
    Depth(usize),
    Time(Duration),
    States(usize),
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Depth(d) => write!(f, "depth budget {}", d),
            Budget::Time(t) => write!(f, "time budget {:.3} s", t.as_secs_f64()),
            Budget::States(n) => write!(f, "state budget {}", n),
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SearchStats {
    /// Nodes reached, including pruned and violating ones.
    pub visited: usize,
    pub expanded: usize,
    pub pruned: usize,
    /// Moves whose guard was unsatisfiable.
    pub infeasible: usize,
    pub encoding_errors: usize,
    pub violations: usize,
    /// Nodes left unexpanded by the depth budget.
    pub cut: usize,
    pub max_depth: usize,
    pub table_regions: usize,
}

impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "visited={} expanded={} pruned={} infeasible={} violations={} cut={} max_depth={} regions={}",
            self.visited,
            self.expanded,
            self.pruned,
            self.infeasible,
            self.violations,
            self.cut,
            self.max_depth,
            self.table_regions,
        )?;
        if self.encoding_errors > 0 {
            write!(f, " encoding_errors={}", self.encoding_errors)?;
        }
        Ok(())
    }
}

/// One state on a path, with the move that reached it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Step {
    pub via: Option<Move>,
    pub state: SymbolicState,
}

/// A path from the initial state to a state violating mutual exclusion.
#[derive(Debug, Clone)]
pub struct Witness {
    steps: Vec<Step>,
    region: Region,
    concrete: Option<Vec<Vec<i64>>>,
}

impl Witness {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The violating state.
    pub fn state(&self) -> &SymbolicState {
        // A witness always holds at least the initial state.
        &self.steps[self.steps.len() - 1].state
    }

    /// Constraints on the tickets of the violating state.
    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn moves(&self) -> impl Iterator<Item = Move> + '_ {
        self.steps.iter().filter_map(|s| s.via)
    }

    /// Processes in the critical section in the violating state.
    pub fn critical(&self) -> Vec<ProcessId> {
        critical_processes(self.state().control())
    }

    /// Integer ticket values for every step, consistent along the path.
    pub fn concrete_tickets(&self) -> Option<&[Vec<i64>]> {
        self.concrete.as_deref()
    }
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let critical: Vec<String> = self.critical().iter().map(|p| format!("P{}", p.id())).collect();
        writeln!(
            f,
            "{} in the critical section after {} steps",
            critical.join(", "),
            self.steps.len() - 1
        )?;
        for (i, step) in self.steps.iter().enumerate() {
            let label = step.via.map_or("init".to_string(), |mv| mv.to_string());
            write!(f, "  {:>3}: {:<10} {}", i, label, step.state.control())?;
            if let Some(concrete) = &self.concrete {
                write!(f, " tickets={:?}", concrete[i])?;
            }
            writeln!(f)?;
        }
        write!(f, "  constraints: {}", self.region)
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Violation(Witness),
    NoViolation,
    /// A budget cut the search and no violation was found before.
    Inconclusive(Budget),
}

impl Outcome {
    pub fn is_violation(&self) -> bool {
        matches!(self, Outcome::Violation(_))
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Outcome::NoViolation)
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            Outcome::Violation(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Violation(_) => write!(f, "property violation found"),
            Outcome::NoViolation => write!(f, "no property violation found"),
            Outcome::Inconclusive(budget) => write!(f, "inconclusive: {} exhausted", budget),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub outcome: Outcome,
    /// Violations found after the first one, when the search does not stop.
    pub further_violations: Vec<Witness>,
    pub stats: SearchStats,
}

struct ChoicePoint {
    step: Step,
    moves: Vec<Move>,
    next: usize,
    mark: Mark,
}

enum Visit {
    Violation(Witness),
    Pruned,
    Expanded,
    Cut,
    Abort(Budget),
}

/// A single run of the checker. The table and the store live for one run.
pub struct Checker {
    config: CheckerConfig,
    model: BakeryModel,
    table: Table,
    store: ConstraintStore,
    stats: SearchStats,
    started: Instant,
    /// The time budget and the instant it runs out.
    deadline: Option<(Duration, Instant)>,
    cut: Option<Budget>,
}

impl Checker {
    pub fn new(config: CheckerConfig, model: BakeryModel) -> Result<Self, CheckError> {
        if config.processes == 0 {
            return Err(CheckError::ZeroProcesses);
        }
        if u32::try_from(config.processes).is_err() {
            return Err(CheckError::TooManyProcesses {
                processes: config.processes,
            });
        }
        Ok(Self {
            table: Table::new(config.subsumption),
            config,
            model,
            store: ConstraintStore::new(),
            stats: SearchStats::default(),
            started: Instant::now(),
            deadline: None,
            cut: None,
        })
    }

    /// Explores every reachable symbolic state not pruned by tabling.
    pub fn run(mut self, sink: &mut dyn TraceSink) -> Report {
        info!(
            "checking mutual exclusion: N={} draw={:?} entry={:?} subsumption={:?}",
            self.config.processes, self.model.draw, self.model.entry, self.config.subsumption
        );
        self.started = Instant::now();
        self.deadline = self
            .config
            .time_limit
            .and_then(|limit| Some((limit, self.started.checked_add(limit)?)));

        let mut stack: Vec<ChoicePoint> = Vec::new();
        let mut witnesses: Vec<Witness> = Vec::new();
        let mut aborted = None;

        let mut pending = Some(Step {
            via: None,
            state: SymbolicState::initial(self.config.processes),
        });
        while let Some(step) = pending.take().or_else(|| self.advance(&mut stack)) {
            match self.visit(step, &mut stack, sink) {
                Visit::Violation(witness) => {
                    witnesses.push(witness);
                    if self.config.stop_at_first_violation {
                        break;
                    }
                }
                Visit::Abort(budget) => {
                    aborted = Some(budget);
                    break;
                }
                Visit::Pruned | Visit::Expanded | Visit::Cut => {}
            }
        }

        self.stats.table_regions = self.table.len();
        let mut witnesses = witnesses.into_iter();
        let outcome = match (witnesses.next(), aborted.or(self.cut)) {
            (Some(witness), _) => Outcome::Violation(witness),
            (None, Some(budget)) => Outcome::Inconclusive(budget),
            (None, None) => Outcome::NoViolation,
        };
        info!(
            "{} in {:.3} s ({})",
            outcome,
            self.started.elapsed().as_secs_f64(),
            self.stats
        );

        Report {
            outcome,
            further_violations: witnesses.collect(),
            stats: self.stats,
        }
    }

    /// Produces the next feasible child of the deepest choice point,
    /// popping exhausted choice points on the way.
    fn advance(&mut self, stack: &mut Vec<ChoicePoint>) -> Option<Step> {
        loop {
            let top = stack.last_mut()?;
            let Some(&mv) = top.moves.get(top.next) else {
                stack.pop();
                continue;
            };
            top.next += 1;

            self.store.undo(top.mark);
            match self.model.apply(&top.step.state, mv, &mut self.store) {
                Ok(state) => {
                    return Some(Step {
                        via: Some(mv),
                        state,
                    })
                }
                Err(StoreError::Unsatisfiable) => {
                    debug!("{} from {} is infeasible", mv, top.step.state);
                    self.stats.infeasible += 1;
                }
                Err(StoreError::Encoding(e)) => self.encoding_error(&mv, &e),
            }
        }
    }

    fn visit(&mut self, step: Step, stack: &mut Vec<ChoicePoint>, sink: &mut dyn TraceSink) -> Visit {
        if let Some(limit) = self.config.max_states {
            if self.stats.visited >= limit {
                return Visit::Abort(Budget::States(limit));
            }
        }

        let depth = stack.len();
        self.stats.visited += 1;
        self.stats.max_depth = max(self.stats.max_depth, depth);

        if let Err(e) = step.state.check_idle_invariant() {
            self.encoding_error(&step.state, &e);
            return Visit::Pruned;
        }

        let region = step.state.region(&self.store);
        if sink.enabled() {
            sink.visit(depth, step.state.control(), &region);
        }

        if violates_mutex(step.state.control()) {
            self.stats.violations += 1;
            let witness = self.witness(stack, step, region);
            info!("violation at depth {}: {}", depth, witness.state());
            return Visit::Violation(witness);
        }

        if let Some((limit, at)) = self.deadline {
            if Instant::now() >= at {
                return Visit::Abort(Budget::Time(limit));
            }
        }

        match self
            .table
            .lookup(&step.state, &mut self.store, self.deadline.map(|(_, at)| at))
        {
            Ok(Coverage::Covered) => {
                self.stats.pruned += 1;
                return Visit::Pruned;
            }
            Ok(Coverage::NotCovered) => {}
            Ok(Coverage::Unknown) => {
                // Only a deadline makes a lookup inconclusive.
                let limit = self.deadline.map_or(Duration::ZERO, |(limit, _)| limit);
                return Visit::Abort(Budget::Time(limit));
            }
            Err(e) => {
                self.encoding_error(&step.state, &e);
                return Visit::Pruned;
            }
        }

        if let Some(limit) = self.config.max_depth {
            if depth >= limit {
                self.stats.cut += 1;
                self.cut = Some(Budget::Depth(limit));
                return Visit::Cut;
            }
        }

        self.table.record(step.state.control(), &region);
        self.stats.expanded += 1;
        let moves = self.model.moves(&step.state);
        debug!("expand {} at depth {} with {} moves", step.state, depth, moves.len());
        stack.push(ChoicePoint {
            step,
            moves,
            next: 0,
            mark: self.store.mark(),
        });
        Visit::Expanded
    }

    fn witness(&self, stack: &[ChoicePoint], last: Step, region: Region) -> Witness {
        let mut steps: Vec<Step> = stack.iter().map(|cp| cp.step.clone()).collect();
        steps.push(last);
        let concrete = self.store.least_integer_solution().map(|solution| {
            steps
                .iter()
                .map(|s| s.state.concrete_tickets(&solution))
                .collect()
        });
        Witness {
            steps,
            region,
            concrete,
        }
    }

    fn encoding_error(&mut self, context: &dyn fmt::Display, e: &EncodingError) {
        error!("encoding error at {}: {}", context, e);
        self.stats.encoding_errors += 1;
    }
}

/// Runs one silent check.
pub fn check(config: &CheckerConfig, model: &BakeryModel) -> Result<Report, CheckError> {
    Ok(Checker::new(config.clone(), *model)?.run(&mut Silent))
}
