//! Special-variable hook registry — callbacks fired when a shell variable
//! with shell-wide side effects changes (`IFS`, `PATH`, history controls,
//! and the rest of the recognized table).
//!
//! `SPECIAL_VARIABLE_HOOKS`/`hook_for` keep the static, name-only registry
//! (mirrors the `lazy_static!` table in [`crate::dynamic`]): a lookup by
//! name to decide *whether* a variable is special at all. The actual
//! per-variable effect is stateful (a recompiled `GLOBIGNORE` pattern list,
//! a parsed `BASH_COMPAT` level, ...) and so lives on [`HookContext`],
//! constructed once per interpreter instance alongside
//! [`crate::dynamic::install_all`]'s `ProcessView`.

use std::collections::HashSet;

use lazy_static::lazy_static;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::pattern::Pattern;
use crate::scope::ScopeStack;

/// A hook fires after a special variable is assigned (or unset); it reads
/// the variable's current value itself via the `ScopeStack` it's given,
/// rather than being handed a value directly, matching the
/// "callbacks fetch the current value themselves" contract.
pub type HookFn = fn(&ScopeStack, name: &str);

#[derive(Clone, Copy)]
pub struct HookSpec {
    pub name: &'static str,
    pub hook: HookFn,
}

fn generic_trace(scope: &ScopeStack, name: &str) {
    let value = scope.lookup(name).map(|v| v.payload().scalarize()).unwrap_or_default();
    debug!("hooks: special variable `{name}' changed to `{value}'");
}

lazy_static! {
    /// All rows of the special-variable hook table, sorted by name
    /// (bash dispatches these in a fixed, name-sorted order at startup and
    /// on `source`/`.`-induced re-evaluation).
    pub static ref SPECIAL_VARIABLE_HOOKS: Vec<HookSpec> = {
        let names = [
            "BASH_COMPAT",
            "BASH_XTRACEFD",
            "COLUMNS",
            "EXECIGNORE",
            "FUNCNEST",
            "GLOBIGNORE",
            "HISTCONTROL",
            "HISTFILESIZE",
            "HISTIGNORE",
            "HISTSIZE",
            "HISTTIMEFORMAT",
            "IFS",
            "LINES",
            "MAIL",
            "MAILCHECK",
            "MAILPATH",
            "OPTERR",
            "OPTIND",
            "PATH",
            "POSIXLY_CORRECT",
            "TZ",
        ];
        let mut v: Vec<HookSpec> = names
            .iter()
            .map(|name| HookSpec { name, hook: generic_trace as HookFn })
            .collect();
        v.sort_by_key(|spec| spec.name);
        v
    };
}

/// Look up the hook registered for `name`, if any.
pub fn hook_for(name: &str) -> Option<HookFn> {
    SPECIAL_VARIABLE_HOOKS
        .iter()
        .find(|spec| spec.name == name)
        .map(|spec| spec.hook)
}

/// Invoke the registered hook for `name`, if any, after an assignment or
/// unset has already landed in `scope` (hooks observe post-assignment
/// state). This is the trace-only fallback; callers tracking real
/// side-effecting state should use [`HookContext::fire`] instead.
pub fn fire(scope: &ScopeStack, name: &str) {
    if let Some(hook) = hook_for(name) {
        hook(scope, name);
    }
}

/// Lowest `BASH_COMPAT` level this crate accepts, matching the real shell's
/// own historical floor.
pub const MIN_COMPAT_LEVEL: u32 = 31;
/// Highest `BASH_COMPAT` level this crate understands itself to implement.
pub const CURRENT_COMPAT_LEVEL: u32 = 54;

/// Per-interpreter-instance state the special-variable hooks maintain
/// between invocations: `IFS`'s recomputed field-splitting class, the
/// recompiled `GLOBIGNORE`/`EXECIGNORE` pattern lists, parsed
/// `BASH_COMPAT`/`BASH_XTRACEFD`/`FUNCNEST` values, and so on. An embedding
/// interpreter owns one of these and calls [`HookContext::fire`] after every
/// assignment or unset to a name [`hook_for`] recognizes.
pub struct HookContext {
    pub ifs_chars: HashSet<char>,
    /// Set to true on every `PATH` change; the embedder is expected to
    /// observe it and flush whatever command-location hash it keeps, then
    /// clear it.
    pub path_hash_dirty: bool,
    pub mail_check_interval_secs: u64,
    pub history_size: Option<usize>,
    pub globignore_patterns: Vec<Pattern>,
    pub execignore_patterns: Vec<Pattern>,
    pub optind: u32,
    pub opterr: bool,
    pub posixly_correct: bool,
    pub bash_xtracefd: Option<i32>,
    pub bash_compat: u32,
    pub funcnest: Option<u32>,
    /// `LINES`/`COLUMNS`, forwarded to the line editor only in posix mode
    /// (outside posix mode bash lets the terminal's own SIGWINCH handling
    /// own these).
    pub lines: Option<u32>,
    pub columns: Option<u32>,
}

impl Default for HookContext {
    fn default() -> Self {
        HookContext {
            ifs_chars: [' ', '\t', '\n'].into_iter().collect(),
            path_hash_dirty: false,
            mail_check_interval_secs: 60,
            history_size: Some(500),
            globignore_patterns: Vec::new(),
            execignore_patterns: Vec::new(),
            optind: 1,
            opterr: true,
            posixly_correct: false,
            bash_xtracefd: None,
            bash_compat: CURRENT_COMPAT_LEVEL,
            funcnest: None,
            lines: None,
            columns: None,
        }
    }
}

impl HookContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn scalar(scope: &ScopeStack, name: &str) -> Option<String> {
        scope.lookup(name).map(|v| v.payload().scalarize())
    }

    /// Dispatch the differentiated effect for `name`, reading its
    /// post-assignment value from `scope` itself. Can fail with
    /// `CompatRange` or `FdInvalid`; every other row cannot fail.
    pub fn fire(&mut self, scope: &ScopeStack, name: &str) -> Result<()> {
        match name {
            "IFS" => self.on_ifs(scope),
            "PATH" => self.on_path(),
            "MAIL" | "MAILPATH" => self.on_mail_path(),
            "MAILCHECK" => self.on_mailcheck(scope),
            "HISTSIZE" => self.on_histsize(scope),
            "HISTFILESIZE" | "HISTCONTROL" | "HISTIGNORE" | "HISTTIMEFORMAT" => {
                self.on_history_config(scope, name)
            }
            "GLOBIGNORE" => self.on_globignore(scope),
            "EXECIGNORE" => self.on_execignore(scope),
            "OPTIND" => self.on_optind(scope),
            "OPTERR" => self.on_opterr(scope),
            "POSIXLY_CORRECT" => self.on_posixly_correct(scope),
            "TZ" => self.on_tz(),
            "BASH_XTRACEFD" => self.on_xtracefd(scope),
            "BASH_COMPAT" => self.on_bash_compat(scope),
            "LINES" => self.on_lines_columns(scope, true),
            "COLUMNS" => self.on_lines_columns(scope, false),
            "FUNCNEST" => self.on_funcnest(scope),
            _ => Ok(()),
        }
    }

    fn on_ifs(&mut self, scope: &ScopeStack) -> Result<()> {
        self.ifs_chars = match Self::scalar(scope, "IFS") {
            Some(s) => s.chars().collect(),
            None => [' ', '\t', '\n'].into_iter().collect(),
        };
        debug!("hooks: IFS field-splitting class recomputed to {:?}", self.ifs_chars);
        Ok(())
    }

    fn on_path(&mut self) -> Result<()> {
        self.path_hash_dirty = true;
        debug!("hooks: PATH changed, command-location hash flush requested");
        Ok(())
    }

    fn on_mail_path(&mut self) -> Result<()> {
        debug!("hooks: mailbox watch list rebuilt");
        Ok(())
    }

    fn on_mailcheck(&mut self, scope: &ScopeStack) -> Result<()> {
        if let Some(v) = Self::scalar(scope, "MAILCHECK") {
            match v.parse::<u64>() {
                Ok(secs) => self.mail_check_interval_secs = secs,
                Err(_) => warn!("hooks: MAILCHECK value `{v}' is not numeric, keeping previous interval"),
            }
        }
        Ok(())
    }

    fn on_histsize(&mut self, scope: &ScopeStack) -> Result<()> {
        self.history_size = match Self::scalar(scope, "HISTSIZE") {
            Some(v) => v.parse::<usize>().ok(),
            None => None,
        };
        debug!("hooks: history subsystem reconfigured, size={:?}", self.history_size);
        Ok(())
    }

    fn on_history_config(&mut self, scope: &ScopeStack, name: &str) -> Result<()> {
        let value = Self::scalar(scope, name).unwrap_or_default();
        debug!("hooks: history subsystem reconfigured ({name}={value})");
        Ok(())
    }

    fn on_globignore(&mut self, scope: &ScopeStack) -> Result<()> {
        self.globignore_patterns = compile_colon_list(Self::scalar(scope, "GLOBIGNORE"));
        Ok(())
    }

    fn on_execignore(&mut self, scope: &ScopeStack) -> Result<()> {
        self.execignore_patterns = compile_colon_list(Self::scalar(scope, "EXECIGNORE"));
        Ok(())
    }

    fn on_optind(&mut self, scope: &ScopeStack) -> Result<()> {
        self.optind = Self::scalar(scope, "OPTIND").and_then(|v| v.parse().ok()).unwrap_or(1);
        Ok(())
    }

    fn on_opterr(&mut self, scope: &ScopeStack) -> Result<()> {
        self.opterr = Self::scalar(scope, "OPTERR").map(|v| v != "0").unwrap_or(true);
        Ok(())
    }

    fn on_posixly_correct(&mut self, scope: &ScopeStack) -> Result<()> {
        // Bash treats mere presence (even an empty value) as entering posix
        // mode; unset leaves it.
        self.posixly_correct = scope.lookup("POSIXLY_CORRECT").is_some();
        debug!("hooks: posix mode now {}", self.posixly_correct);
        Ok(())
    }

    fn on_tz(&mut self) -> Result<()> {
        #[cfg(unix)]
        unsafe {
            libc::tzset();
        }
        debug!("hooks: timezone re-initialized");
        Ok(())
    }

    fn on_xtracefd(&mut self, scope: &ScopeStack) -> Result<()> {
        let raw = match Self::scalar(scope, "BASH_XTRACEFD") {
            Some(v) => v,
            None => {
                self.bash_xtracefd = None;
                return Ok(());
            }
        };
        let fd: i32 = raw.parse().map_err(|_| Error::FdInvalid(raw.clone()))?;
        if !fd_is_writable(fd) {
            return Err(Error::FdInvalid(raw));
        }
        self.bash_xtracefd = Some(fd);
        Ok(())
    }

    fn on_bash_compat(&mut self, scope: &ScopeStack) -> Result<()> {
        let raw = Self::scalar(scope, "BASH_COMPAT").unwrap_or_default();
        // Accept both "5.4"-style and "54"-style spellings, as real bash
        // does for this variable.
        let normalized = raw.replace('.', "");
        let level: u32 = normalized.parse().map_err(|_| Error::CompatRange(raw.clone()))?;
        if level < MIN_COMPAT_LEVEL || level > CURRENT_COMPAT_LEVEL {
            let clamped = level.clamp(MIN_COMPAT_LEVEL, CURRENT_COMPAT_LEVEL);
            warn!("hooks: BASH_COMPAT {level} out of range, clamped to {clamped}");
            self.bash_compat = clamped;
        } else {
            self.bash_compat = level;
        }
        Ok(())
    }

    fn on_lines_columns(&mut self, scope: &ScopeStack, is_lines: bool) -> Result<()> {
        if !self.posixly_correct {
            // Outside posix mode this is the terminal's concern, not this
            // hook's; the forward only applies in strict posix mode.
            return Ok(());
        }
        let name = if is_lines { "LINES" } else { "COLUMNS" };
        let parsed = Self::scalar(scope, name).and_then(|v| v.parse::<u32>().ok());
        if is_lines {
            self.lines = parsed;
        } else {
            self.columns = parsed;
        }
        Ok(())
    }

    fn on_funcnest(&mut self, scope: &ScopeStack) -> Result<()> {
        self.funcnest = Self::scalar(scope, "FUNCNEST").and_then(|v| v.parse().ok());
        Ok(())
    }
}

fn compile_colon_list(value: Option<String>) -> Vec<Pattern> {
    match value {
        Some(v) if !v.is_empty() => v.split(':').map(Pattern::compile).collect(),
        _ => Vec::new(),
    }
}

#[cfg(unix)]
fn fd_is_writable(fd: i32) -> bool {
    if fd < 0 {
        return false;
    }
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags == -1 {
            return false;
        }
        let access_mode = flags & libc::O_ACCMODE;
        access_mode == libc::O_WRONLY || access_mode == libc::O_RDWR
    }
}

#[cfg(not(unix))]
fn fd_is_writable(_fd: i32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as ShResult;

    fn noop(s: &str) -> ShResult<String> {
        Ok(s.to_string())
    }

    #[test]
    fn registry_covers_all_hook_rows() {
        for name in [
            "IFS", "PATH", "MAIL", "MAILPATH", "MAILCHECK", "HISTSIZE", "HISTFILESIZE",
            "HISTCONTROL", "HISTIGNORE", "HISTTIMEFORMAT", "GLOBIGNORE", "EXECIGNORE",
            "OPTIND", "OPTERR", "POSIXLY_CORRECT", "TZ", "BASH_XTRACEFD", "BASH_COMPAT",
            "LINES", "COLUMNS", "FUNCNEST",
        ] {
            assert!(hook_for(name).is_some(), "missing hook for {name}");
        }
    }

    #[test]
    fn unregistered_name_has_no_hook() {
        assert!(hook_for("NOT_SPECIAL").is_none());
    }

    #[test]
    fn fire_does_not_panic_on_missing_variable() {
        let scope = ScopeStack::new();
        fire(&scope, "IFS");
    }

    #[test]
    fn ifs_hook_recomputes_field_splitting_class() {
        let mut scope = ScopeStack::new();
        scope.bind("IFS").unwrap().assign_scalar(":,", false, noop).unwrap();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "IFS").unwrap();
        assert_eq!(ctx.ifs_chars, [':', ','].into_iter().collect());
    }

    #[test]
    fn path_hook_marks_hash_dirty() {
        let scope = ScopeStack::new();
        let mut ctx = HookContext::new();
        assert!(!ctx.path_hash_dirty);
        ctx.fire(&scope, "PATH").unwrap();
        assert!(ctx.path_hash_dirty);
    }

    #[test]
    fn globignore_hook_compiles_colon_separated_patterns() {
        let mut scope = ScopeStack::new();
        scope.bind("GLOBIGNORE").unwrap().assign_scalar(".*:*~", false, noop).unwrap();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "GLOBIGNORE").unwrap();
        assert_eq!(ctx.globignore_patterns.len(), 2);
    }

    #[test]
    fn bash_compat_out_of_range_clamps() {
        let mut scope = ScopeStack::new();
        scope.bind("BASH_COMPAT").unwrap().assign_scalar("10", false, noop).unwrap();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "BASH_COMPAT").unwrap();
        assert_eq!(ctx.bash_compat, MIN_COMPAT_LEVEL);
    }

    #[test]
    fn bash_compat_non_numeric_is_compat_range_error() {
        let mut scope = ScopeStack::new();
        scope.bind("BASH_COMPAT").unwrap().assign_scalar("nope", false, noop).unwrap();
        let mut ctx = HookContext::new();
        let err = ctx.fire(&scope, "BASH_COMPAT").unwrap_err();
        assert_eq!(err, Error::CompatRange("nope".to_string()));
    }

    #[test]
    fn bash_compat_accepts_dotted_spelling() {
        let mut scope = ScopeStack::new();
        scope.bind("BASH_COMPAT").unwrap().assign_scalar("5.0", false, noop).unwrap();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "BASH_COMPAT").unwrap();
        assert_eq!(ctx.bash_compat, 50);
    }

    #[test]
    fn xtracefd_rejects_unwritable_descriptor() {
        let mut scope = ScopeStack::new();
        // fd 0 (stdin) is read-only in a typical test harness; treat any
        // negative/non-numeric value as the portable invalid case too.
        scope.bind("BASH_XTRACEFD").unwrap().assign_scalar("not-a-fd", false, noop).unwrap();
        let mut ctx = HookContext::new();
        let err = ctx.fire(&scope, "BASH_XTRACEFD").unwrap_err();
        assert_eq!(err, Error::FdInvalid("not-a-fd".to_string()));
    }

    #[test]
    fn posixly_correct_tracks_presence_not_value() {
        let mut scope = ScopeStack::new();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "POSIXLY_CORRECT").unwrap();
        assert!(!ctx.posixly_correct);
        scope.bind("POSIXLY_CORRECT").unwrap().assign_scalar("", false, noop).unwrap();
        ctx.fire(&scope, "POSIXLY_CORRECT").unwrap();
        assert!(ctx.posixly_correct);
    }

    #[test]
    fn lines_columns_ignored_outside_posix_mode() {
        let mut scope = ScopeStack::new();
        scope.bind("LINES").unwrap().assign_scalar("40", false, noop).unwrap();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "LINES").unwrap();
        assert_eq!(ctx.lines, None);
    }

    #[test]
    fn lines_columns_forwarded_in_posix_mode() {
        let mut scope = ScopeStack::new();
        scope.bind("POSIXLY_CORRECT").unwrap().assign_scalar("", false, noop).unwrap();
        scope.bind("LINES").unwrap().assign_scalar("40", false, noop).unwrap();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "POSIXLY_CORRECT").unwrap();
        ctx.fire(&scope, "LINES").unwrap();
        assert_eq!(ctx.lines, Some(40));
    }

    #[test]
    fn funcnest_parses_numeric_limit() {
        let mut scope = ScopeStack::new();
        scope.bind("FUNCNEST").unwrap().assign_scalar("200", false, noop).unwrap();
        let mut ctx = HookContext::new();
        ctx.fire(&scope, "FUNCNEST").unwrap();
        assert_eq!(ctx.funcnest, Some(200));
    }
}
