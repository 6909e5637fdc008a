//! Dynamic-variable dispatch — synthesized variables recomputed on read.
//!
//! Wall-clock-derived variables (`SECONDS`, `EPOCHSECONDS`, ...) sit behind
//! a `Clock` trait so tests don't depend on real wall-clock time, wired
//! through the getter/setter hook slots already carried by
//! [`crate::variable::Variable`]. Registration uses `lazy_static!` for the
//! static metadata table so the recognized names are registered once, at
//! startup; the actual stateful closures are installed per-interpreter-
//! instance by [`install_all`] since they close over PRNG state and
//! call-stack views that cannot be `'static`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lazy_static::lazy_static;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::error::Result;
use crate::scope::ScopeStack;
use crate::variable::Payload;

/// Static metadata about a dynamic variable: its name and whether it accepts
/// a setter (`SRANDOM`, `LINENO`'s siblings, etc. are getter-only).
#[derive(Debug, Clone, Copy)]
pub struct DynamicSpec {
    pub name: &'static str,
    pub settable: bool,
}

lazy_static! {
    /// All recognized synthesized variables, registered once.
    pub static ref DYNAMIC_VARIABLES: HashMap<&'static str, DynamicSpec> = {
        let settable = [
            "SECONDS", "RANDOM", "LINENO", "HISTCMD", "DIRSTACK",
        ];
        let getter_only = [
            "SRANDOM", "BASHPID", "EPOCHSECONDS", "EPOCHREALTIME", "BASH_SUBSHELL",
            "FUNCNAME", "BASH_SOURCE", "BASH_LINENO", "GROUPS",
            "BASH_CMDS", "BASH_ALIASES",
        ];
        let mut m = HashMap::new();
        for name in settable {
            m.insert(name, DynamicSpec { name, settable: true });
        }
        for name in getter_only {
            m.insert(name, DynamicSpec { name, settable: false });
        }
        m
    };
}

/// Wall-clock source, abstracted so `SECONDS`/`EPOCHSECONDS`/`EPOCHREALTIME`
/// can be driven by a fake clock in tests.
pub trait Clock {
    /// Seconds since the Unix epoch, with sub-second precision.
    fn now(&self) -> f64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_millis() as f64 / 1000.0
    }
}

pub struct FakeClock(pub RefCell<f64>);

impl FakeClock {
    pub fn new(start: f64) -> Self {
        FakeClock(RefCell::new(start))
    }

    pub fn advance(&self, secs: f64) {
        *self.0.borrow_mut() += secs;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> f64 {
        *self.0.borrow()
    }
}

/// Per-instance call-stack view the `FUNCNAME`/`BASH_SOURCE`/`BASH_LINENO`
/// and `DIRSTACK`/`GROUPS` getters read from. An embedding interpreter
/// updates this as it pushes/pops function frames and directory-stack
/// entries; this crate only exposes it to the dynamic-variable getters.
#[derive(Default)]
pub struct ProcessView {
    pub func_name_stack: Vec<String>,
    pub source_stack: Vec<String>,
    pub line_stack: Vec<i64>,
    pub dir_stack: Vec<String>,
    pub groups: Vec<u32>,
    pub current_lineno: i64,
    pub subshell_depth: i64,
    pub hist_cmd_number: i64,
}

/// Installs all [`DYNAMIC_VARIABLES`] onto the global frame of `scope`,
/// wiring getter/setter closures that close over `clock`, `pid`, a PRNG seed,
/// and `process`.
pub fn install_all(
    scope: &mut ScopeStack,
    clock: Rc<dyn Clock>,
    pid: u32,
    process: Rc<RefCell<ProcessView>>,
) -> Result<()> {
    let start_time = clock.now();

    {
        let clock = clock.clone();
        let base = Rc::new(RefCell::new(0i64));
        let getter_clock = clock.clone();
        let getter_base = base.clone();
        let var = scope.bind_global("SECONDS")?;
        var.set_getter(Rc::new(move || {
            let elapsed = (getter_clock.now() - start_time) as i64 + *getter_base.borrow();
            Payload::Scalar(elapsed.to_string())
        }));
        var.set_setter(Rc::new(move |p| {
            if let Payload::Scalar(s) = &p {
                if let Ok(n) = s.parse::<i64>() {
                    let elapsed = (clock.now() - start_time) as i64;
                    *base.borrow_mut() = n - elapsed;
                }
            }
            p
        }));
    }

    {
        // RANDOM: 15-bit value, reseeded (and re-rolled to avoid an
        // immediately-repeated value) on explicit assignment.
        let rng = Rc::new(RefCell::new(StdRng::from_entropy()));
        let last = Rc::new(RefCell::new(-1i32));
        let getter_rng = rng.clone();
        let getter_last = last.clone();
        let var = scope.bind_global("RANDOM")?;
        var.set_getter(Rc::new(move || {
            let mut n = getter_rng.borrow_mut().gen_range(0..=32767);
            if n == *getter_last.borrow() {
                n = getter_rng.borrow_mut().gen_range(0..=32767);
            }
            *getter_last.borrow_mut() = n;
            Payload::Scalar(n.to_string())
        }));
        var.set_setter(Rc::new(move |p| {
            if let Payload::Scalar(s) = &p {
                if let Ok(seed) = s.parse::<u64>() {
                    *rng.borrow_mut() = StdRng::seed_from_u64(seed);
                }
            }
            p
        }));
    }

    {
        let var = scope.bind_global("SRANDOM")?;
        var.set_getter(Rc::new(|| Payload::Scalar(rand::thread_rng().next_u32().to_string())));
    }

    {
        let process = process.clone();
        let base = Rc::new(RefCell::new(0i64));
        let getter_process = process.clone();
        let getter_base = base.clone();
        let var = scope.bind_global("LINENO")?;
        var.set_getter(Rc::new(move || {
            Payload::Scalar((getter_process.borrow().current_lineno + *getter_base.borrow()).to_string())
        }));
        var.set_setter(Rc::new(move |p| {
            if let Payload::Scalar(s) = &p {
                if let Ok(n) = s.parse::<i64>() {
                    *base.borrow_mut() = n - process.borrow().current_lineno;
                }
            }
            p
        }));
    }

    {
        let var = scope.bind_global("BASHPID")?;
        var.set_getter(Rc::new(move || Payload::Scalar(pid.to_string())));
    }

    {
        let clock = clock.clone();
        let var = scope.bind_global("EPOCHSECONDS")?;
        var.set_getter(Rc::new(move || Payload::Scalar((clock.now() as i64).to_string())));
    }

    {
        let clock = clock.clone();
        let var = scope.bind_global("EPOCHREALTIME")?;
        var.set_getter(Rc::new(move || Payload::Scalar(format!("{:.6}", clock.now()))));
    }

    {
        let process = process.clone();
        let var = scope.bind_global("BASH_SUBSHELL")?;
        var.set_getter(Rc::new(move || Payload::Scalar(process.borrow().subshell_depth.to_string())));
    }

    {
        let process = process.clone();
        let base = Rc::new(RefCell::new(0i64));
        let getter_process = process.clone();
        let getter_base = base.clone();
        let var = scope.bind_global("HISTCMD")?;
        var.set_getter(Rc::new(move || {
            Payload::Scalar((getter_process.borrow().hist_cmd_number + *getter_base.borrow()).to_string())
        }));
        var.set_setter(Rc::new(move |p| {
            if let Payload::Scalar(s) = &p {
                if let Ok(n) = s.parse::<i64>() {
                    *base.borrow_mut() = n - process.borrow().hist_cmd_number;
                }
            }
            p
        }));
    }

    {
        let process = process.clone();
        let var = scope.bind_global("FUNCNAME")?;
        var.set_getter(Rc::new(move || {
            let mut m = std::collections::BTreeMap::new();
            for (i, name) in process.borrow().func_name_stack.iter().rev().enumerate() {
                m.insert(i as i64, name.clone());
            }
            Payload::IndexedArray(m)
        }));
    }

    {
        let process = process.clone();
        let var = scope.bind_global("BASH_SOURCE")?;
        var.set_getter(Rc::new(move || {
            let mut m = std::collections::BTreeMap::new();
            for (i, src) in process.borrow().source_stack.iter().rev().enumerate() {
                m.insert(i as i64, src.clone());
            }
            Payload::IndexedArray(m)
        }));
    }

    {
        let process = process.clone();
        let var = scope.bind_global("BASH_LINENO")?;
        var.set_getter(Rc::new(move || {
            let mut m = std::collections::BTreeMap::new();
            for (i, line) in process.borrow().line_stack.iter().rev().enumerate() {
                m.insert(i as i64, line.to_string());
            }
            Payload::IndexedArray(m)
        }));
    }

    {
        let process = process.clone();
        let getter_process = process.clone();
        let var = scope.bind_global("DIRSTACK")?;
        var.set_getter(Rc::new(move || {
            let mut m = std::collections::BTreeMap::new();
            for (i, dir) in getter_process.borrow().dir_stack.iter().enumerate() {
                m.insert(i as i64, dir.clone());
            }
            Payload::IndexedArray(m)
        }));
        var.set_setter(Rc::new(move |p| {
            if let Payload::IndexedArray(m) = &p {
                let mut view = process.borrow_mut();
                for (&idx, val) in m {
                    if idx < 0 {
                        continue;
                    }
                    let idx = idx as usize;
                    if idx >= view.dir_stack.len() {
                        view.dir_stack.resize(idx + 1, String::new());
                    }
                    view.dir_stack[idx] = val.clone();
                }
            }
            p
        }));
    }

    {
        // GROUPS is filled lazily from the OS group list on first read, then
        // cached in ProcessView for subsequent reads.
        let process = process.clone();
        let var = scope.bind_global("GROUPS")?;
        var.set_getter(Rc::new(move || {
            let mut view = process.borrow_mut();
            if view.groups.is_empty() {
                view.groups = read_os_groups();
            }
            let mut m = std::collections::BTreeMap::new();
            for (i, gid) in view.groups.iter().enumerate() {
                m.insert(i as i64, gid.to_string());
            }
            Payload::IndexedArray(m)
        }));
    }

    scope.bind_global("BASH_CMDS")?.convert_to_assoc(true)?;
    scope.bind_global("BASH_ALIASES")?.convert_to_assoc(true)?;

    Ok(())
}

#[cfg(unix)]
fn read_os_groups() -> Vec<u32> {
    let mut out = Vec::new();
    unsafe {
        let ngroups = libc::getgroups(0, std::ptr::null_mut());
        if ngroups > 0 {
            let mut buf = vec![0 as libc::gid_t; ngroups as usize];
            let n = libc::getgroups(ngroups, buf.as_mut_ptr());
            if n > 0 {
                out = buf[..n as usize].iter().map(|g| *g as u32).collect();
            }
        }
    }
    out
}

#[cfg(not(unix))]
fn read_os_groups() -> Vec<u32> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_recognized_names() {
        for name in [
            "SECONDS", "RANDOM", "SRANDOM", "LINENO", "BASHPID", "EPOCHSECONDS",
            "EPOCHREALTIME", "BASH_SUBSHELL", "HISTCMD", "FUNCNAME", "BASH_SOURCE",
            "BASH_LINENO", "DIRSTACK", "GROUPS", "BASH_CMDS", "BASH_ALIASES",
        ] {
            assert!(DYNAMIC_VARIABLES.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn seconds_advances_with_fake_clock() {
        let clock: Rc<dyn Clock> = Rc::new(FakeClock::new(1000.0));
        let mut scope = ScopeStack::new();
        let process = Rc::new(RefCell::new(ProcessView::default()));
        install_all(&mut scope, clock.clone(), 42, process).unwrap();
        let first = scope.lookup_global_mut("SECONDS").unwrap().effective_payload().scalarize();
        assert_eq!(first, "0");
    }

    #[test]
    fn bashpid_reflects_installed_pid() {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let mut scope = ScopeStack::new();
        let process = Rc::new(RefCell::new(ProcessView::default()));
        install_all(&mut scope, clock, 4242, process).unwrap();
        assert_eq!(
            scope.lookup_global_mut("BASHPID").unwrap().effective_payload().scalarize(),
            "4242"
        );
    }

    #[test]
    fn funcname_reflects_call_stack_innermost_first() {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let mut scope = ScopeStack::new();
        let process = Rc::new(RefCell::new(ProcessView::default()));
        process.borrow_mut().func_name_stack = vec!["main".to_string(), "helper".to_string()];
        install_all(&mut scope, clock, 1, process).unwrap();
        let payload = scope.lookup_global_mut("FUNCNAME").unwrap().effective_payload().clone();
        match payload {
            Payload::IndexedArray(m) => {
                assert_eq!(m.get(&0), Some(&"helper".to_string()));
                assert_eq!(m.get(&1), Some(&"main".to_string()));
            }
            _ => panic!("expected indexed array"),
        }
    }

    #[test]
    fn lineno_setter_rebases_subsequent_reads() {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let mut scope = ScopeStack::new();
        let process = Rc::new(RefCell::new(ProcessView::default()));
        process.borrow_mut().current_lineno = 10;
        install_all(&mut scope, clock, 1, process.clone()).unwrap();
        scope
            .lookup_global_mut("LINENO")
            .unwrap()
            .assign_scalar("100", false, |s| Ok(s.to_string()))
            .unwrap();
        assert_eq!(
            scope.lookup_global_mut("LINENO").unwrap().effective_payload().scalarize(),
            "100"
        );
        process.borrow_mut().current_lineno = 12;
        assert_eq!(
            scope.lookup_global_mut("LINENO").unwrap().effective_payload().scalarize(),
            "102"
        );
    }

    #[test]
    fn dirstack_setter_writes_back_to_process_view() {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let mut scope = ScopeStack::new();
        let process = Rc::new(RefCell::new(ProcessView::default()));
        process.borrow_mut().dir_stack = vec!["/home".to_string(), "/tmp".to_string()];
        install_all(&mut scope, clock, 1, process.clone()).unwrap();
        scope
            .lookup_global_mut("DIRSTACK")
            .unwrap()
            .insert_indexed(1, "/var", false, |s| Ok(s.to_string()))
            .unwrap();
        assert_eq!(process.borrow().dir_stack[1], "/var");
        let payload = scope.lookup_global_mut("DIRSTACK").unwrap().effective_payload().clone();
        match payload {
            Payload::IndexedArray(m) => assert_eq!(m.get(&1), Some(&"/var".to_string())),
            _ => panic!("expected indexed array"),
        }
    }

    #[test]
    fn bash_cmds_and_aliases_are_assoc() {
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let mut scope = ScopeStack::new();
        let process = Rc::new(RefCell::new(ProcessView::default()));
        install_all(&mut scope, clock, 1, process).unwrap();
        assert!(scope
            .lookup_global("BASH_CMDS")
            .unwrap()
            .attributes
            .contains(crate::variable::Attributes::ASSOC));
    }
}
