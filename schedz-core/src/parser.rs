//! Schedule text parser.
//!
//! Keywords are case-insensitive and `//` starts a line comment.
//!
//! ```text
//! file      := schedule*
//! schedule  := ["Schedule" ["="]] SCHED_NAME "{" section* "}"
//! section   := "Tasks" "{" (task [","])* "}"
//!            | "Interrupts" "{" (COND_NAME [","])* "}"
//! task      := TASK_NAME args
//! args      := <nothing> | ("=" | ":") value | value
//!            | ["="] ("(" | "[") (value [","])* (")" | "]")
//! value     := [TAG ":"] (WORD | "QUOTED")
//! ```
//!
//! Every symbol is resolved to an ID while parsing. In strict mode the
//! first problem aborts the whole source; otherwise problems become
//! [`LoadDiagnostic`]s and the offending piece is replaced by something
//! harmless (a placeholder task, a `None` argument, a dropped interrupt bit).

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use serde::Serialize;
use tracing::warn;

use crate::config::LoaderConfig;
use crate::error::{Result, SchedzError};
use crate::id_space::{ClassId, Id, IdSpaceArena};
use crate::namespace::{GlobalId, ScheduleNamespaces, SymbolKind};
use crate::schedule::ConditionBits;
use crate::task::{ParamKind, Task, TaskData, TaskParamCheck};
use crate::types::{Activity, GoalType, MemoryFlags, NpcState, PathType};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One tolerated authoring problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostic {
    /// 1-based source line.
    pub line: u32,
    /// Schedule being parsed, if any.
    pub schedule: Option<String>,
    /// Task being parsed, if any.
    pub task: Option<String>,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)?;
        if let Some(s) = &self.schedule {
            write!(f, " [{s}")?;
            if let Some(t) = &self.task {
                write!(f, " / {t}")?;
            }
            f.write_str("]")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Outcome of loading one schedule source.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Class the source was loaded for.
    pub class: String,
    /// Schedule definitions accepted (merges count once per definition).
    pub schedules: usize,
    /// Tasks accepted, placeholders included.
    pub tasks: usize,
    /// Problems tolerated along the way.
    pub diagnostics: Vec<LoadDiagnostic>,
}

impl LoadReport {
    /// Whether the source loaded without any problem.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parse Output
// ---------------------------------------------------------------------------

/// A schedule definition as read from text, before it is merged into the
/// repository.
#[derive(Debug, Clone)]
pub struct ParsedSchedule {
    /// Schedule name.
    pub name: String,
    /// Resolved global ID.
    pub id: GlobalId,
    /// Tasks in order.
    pub tasks: Vec<Task>,
    /// Interrupt bits.
    pub interrupts: ConditionBits,
    /// Whether anything had to be patched.
    pub patched: bool,
    /// Line of the schedule name.
    pub line: u32,
}

/// Everything one source produced.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    /// Definitions, in source order.
    pub schedules: Vec<ParsedSchedule>,
    /// Tolerated problems.
    pub diagnostics: Vec<LoadDiagnostic>,
}

/// What the parser resolves names against.
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    /// Class name used in messages.
    pub class_name: &'a str,
    /// Class ID space; `None` parses against the global namespaces.
    pub class: Option<ClassId>,
    /// Global namespaces.
    pub namespaces: &'a ScheduleNamespaces,
    /// Class ID spaces.
    pub classes: &'a IdSpaceArena,
    /// Size limits.
    pub limits: &'a LoaderConfig,
    /// Abort on the first problem.
    pub strict: bool,
}

/// Parse a whole schedule source.
///
/// # Errors
/// `ScheduleLoad` on the first problem in strict mode. In tolerant mode a
/// structural error stops parsing but is reported as a diagnostic, and the
/// definitions completed before it are kept.
pub fn parse_schedules(source: &str, cx: ParseContext<'_>) -> Result<ParseOutput> {
    let tokens = match tokenize(cx.class_name, source) {
        Ok(t) => t,
        Err(e) if cx.strict => return Err(e),
        Err(e) => {
            let mut parser = Parser::new(cx, Vec::new());
            parser.note_error(&e);
            return Ok(ParseOutput {
                schedules: Vec::new(),
                diagnostics: parser.diagnostics,
            });
        }
    };
    Parser::new(cx, tokens).run()
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Word(String),
    Quoted(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    lexeme: Lexeme,
    line: u32,
}

fn is_punct(c: char) -> bool {
    matches!(c, '{' | '}' | '(' | ')' | '[' | ']' | ',' | ':' | '=')
}

fn read_word(chars: &mut Peekable<Chars<'_>>, word: &mut String) {
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || is_punct(c) || c == '"' {
            break;
        }
        word.push(c);
        chars.next();
    }
}

fn load_error(class: &str, line: u32, message: impl Into<String>) -> SchedzError {
    SchedzError::ScheduleLoad {
        class: class.to_string(),
        line,
        message: message.into(),
    }
}

fn tokenize(class: &str, source: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut line = 1u32;
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    while chars.peek().is_some_and(|c| *c != '\n') {
                        chars.next();
                    }
                } else {
                    let mut word = String::from('/');
                    read_word(&mut chars, &mut word);
                    out.push(Token {
                        lexeme: Lexeme::Word(word),
                        line,
                    });
                }
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\n') | None => {
                            return Err(load_error(class, line, "unterminated string"));
                        }
                        Some(c) => text.push(c),
                    }
                }
                out.push(Token {
                    lexeme: Lexeme::Quoted(text),
                    line,
                });
            }
            c if is_punct(c) => {
                chars.next();
                out.push(Token {
                    lexeme: Lexeme::Punct(c),
                    line,
                });
            }
            _ => {
                let mut word = String::new();
                read_word(&mut chars, &mut word);
                out.push(Token {
                    lexeme: Lexeme::Word(word),
                    line,
                });
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RawValue {
    tag: Option<String>,
    text: String,
    line: u32,
}

struct Parser<'a> {
    cx: ParseContext<'a>,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<LoadDiagnostic>,
    schedule: Option<String>,
    task: Option<String>,
}

impl<'a> Parser<'a> {
    fn new(cx: ParseContext<'a>, tokens: Vec<Token>) -> Self {
        Self {
            cx,
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            schedule: None,
            task: None,
        }
    }

    fn run(mut self) -> Result<ParseOutput> {
        let mut schedules = Vec::new();
        while self.pos < self.tokens.len() {
            match self.parse_schedule() {
                Ok(Some(s)) => schedules.push(s),
                Ok(None) => {}
                Err(e) if self.cx.strict => return Err(e),
                Err(e) => {
                    self.note_error(&e);
                    break;
                }
            }
        }
        Ok(ParseOutput {
            schedules,
            diagnostics: self.diagnostics,
        })
    }

    // -- token helpers ------------------------------------------------------

    fn line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn syntax(&self, line: u32, message: impl Into<String>) -> SchedzError {
        let message = message.into();
        let message = match &self.schedule {
            Some(s) => format!("{s}: {message}"),
            None => message,
        };
        load_error(self.cx.class_name, line, message)
    }

    fn next_token(&mut self, expected: &str) -> Result<Token> {
        match self.tokens.get(self.pos) {
            Some(t) => {
                self.pos += 1;
                Ok(t.clone())
            }
            None => Err(self.syntax(
                self.line(),
                format!("unexpected end of input, expected {expected}"),
            )),
        }
    }

    fn peek_punct(&self, c: char) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token { lexeme: Lexeme::Punct(p), .. }) if *p == c)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        let hit = self.peek_punct(c);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        let tok = self.next_token(&format!("'{c}'"))?;
        match tok.lexeme {
            Lexeme::Punct(p) if p == c => Ok(()),
            other => Err(self.syntax(
                tok.line,
                format!("expected '{c}', found {}", describe(&other)),
            )),
        }
    }

    fn expect_word(&mut self, what: &str) -> Result<(String, u32)> {
        let tok = self.next_token(what)?;
        match tok.lexeme {
            Lexeme::Word(w) => Ok((w, tok.line)),
            other => Err(self.syntax(
                tok.line,
                format!("expected {what}, found {}", describe(&other)),
            )),
        }
    }

    /// Consume an opening bracket and return the matching close.
    fn eat_open(&mut self) -> Option<char> {
        if self.eat_punct('(') {
            Some(')')
        } else if self.eat_punct('[') {
            Some(']')
        } else {
            None
        }
    }

    // -- problem reporting --------------------------------------------------

    /// Record a recoverable problem, or fail in strict mode.
    fn report(&mut self, line: u32, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if self.cx.strict {
            return Err(self.syntax(line, message));
        }
        warn!(
            class = self.cx.class_name,
            line,
            schedule = self.schedule.as_deref().unwrap_or("-"),
            task = self.task.as_deref().unwrap_or("-"),
            "LoadSchd: {message}"
        );
        self.diagnostics.push(LoadDiagnostic {
            line,
            schedule: self.schedule.clone(),
            task: self.task.clone(),
            message,
        });
        Ok(())
    }

    fn note_error(&mut self, e: &SchedzError) {
        let (line, message) = match e {
            SchedzError::ScheduleLoad { line, message, .. } => (*line, message.clone()),
            other => (self.line(), other.to_string()),
        };
        warn!(class = self.cx.class_name, line, "LoadSchd: {message}; rest of source skipped");
        self.diagnostics.push(LoadDiagnostic {
            line,
            schedule: self.schedule.clone(),
            task: self.task.clone(),
            message,
        });
    }

    // -- symbol resolution --------------------------------------------------

    fn resolve(&self, kind: SymbolKind, name: &str) -> Option<(Id, GlobalId)> {
        let global = self.cx.namespaces.namespace(kind).symbol_to_id(name)?;
        let id = self.cx.classes.localize(self.cx.class, kind, global)?;
        Some((id, global))
    }

    // -- grammar ------------------------------------------------------------

    fn parse_schedule(&mut self) -> Result<Option<ParsedSchedule>> {
        self.schedule = None;
        self.task = None;

        let (mut name, mut line) = self.expect_word("schedule name")?;
        if name.eq_ignore_ascii_case("Schedule") {
            self.eat_punct('=');
            (name, line) = self.expect_word("schedule name")?;
        }
        self.schedule = Some(name.clone());

        let id = match self.resolve(SymbolKind::Schedule, &name) {
            Some((_, g)) => Some(g),
            None => {
                self.report(line, format!("unknown schedule {name}"))?;
                None
            }
        };

        let mut tasks = Vec::new();
        let mut interrupts = ConditionBits::new();
        let mut patched = false;

        self.expect_punct('{')?;
        while !self.eat_punct('}') {
            let (section, section_line) = self.expect_word("Tasks or Interrupts")?;
            if section.eq_ignore_ascii_case("Tasks") {
                self.parse_tasks(&mut tasks, &mut patched)?;
            } else if section.eq_ignore_ascii_case("Interrupts") {
                self.parse_interrupts(&mut interrupts, &mut patched)?;
            } else {
                return Err(self.syntax(
                    section_line,
                    format!("expected Tasks or Interrupts, found {section}"),
                ));
            }
        }

        Ok(id.map(|id| ParsedSchedule {
            name,
            id,
            tasks,
            interrupts,
            patched,
            line,
        }))
    }

    fn parse_tasks(&mut self, tasks: &mut Vec<Task>, patched: &mut bool) -> Result<()> {
        self.expect_punct('{')?;
        let limit = self.cx.limits.max_tasks_per_schedule;
        let mut count = 0usize;
        loop {
            if self.eat_punct('}') {
                break;
            }
            if self.eat_punct(',') {
                continue;
            }
            let (name, line) = self.expect_word("task name")?;
            self.task = Some(name.clone());
            let task = self.parse_task(&name, line, patched)?;
            count += 1;
            if count > limit {
                if count == limit + 1 {
                    self.report(line, format!("too many tasks, limit is {limit}"))?;
                }
                *patched = true;
                continue;
            }
            tasks.push(task);
        }
        self.task = None;
        Ok(())
    }

    fn parse_task(&mut self, name: &str, line: u32, patched: &mut bool) -> Result<Task> {
        let Some((id, global)) = self.resolve(SymbolKind::Task, name) else {
            self.report(line, format!("unknown task {name}"))?;
            *patched = true;
            self.parse_raw_args(&TaskParamCheck::none())?;
            return Ok(Task::placeholder());
        };

        let check = self
            .cx
            .namespaces
            .task_param_check(global)
            .cloned()
            .unwrap_or_default();
        let raw = self.parse_raw_args(&check)?;
        let expected = check.len();

        if raw.is_empty() && check.kinds() == [ParamKind::Null] {
            return Task::resolved(id, global, vec![TaskData::None]);
        }
        if raw.len() != expected {
            self.report(
                line,
                format!("{expected} parameters are expected but found {}", raw.len()),
            )?;
            *patched = true;
        }

        let mut args = Vec::with_capacity(expected);
        for (i, kind) in check.kinds().iter().enumerate() {
            let data = match raw.get(i) {
                None => TaskData::None,
                Some(value) => match self.convert(*kind, value) {
                    Ok(data) => data,
                    Err(message) => {
                        self.report(value.line, format!("parameter {}: {message}", i + 1))?;
                        *patched = true;
                        TaskData::None
                    }
                },
            };
            args.push(data);
        }
        Task::resolved(id, global, args)
    }

    fn parse_interrupts(&mut self, mask: &mut ConditionBits, patched: &mut bool) -> Result<()> {
        self.expect_punct('{')?;
        loop {
            if self.eat_punct('}') {
                return Ok(());
            }
            if self.eat_punct(',') {
                continue;
            }
            let (name, line) = self.expect_word("condition name")?;
            match self.resolve(SymbolKind::Condition, &name) {
                Some((_, cond)) => mask.set_condition(cond),
                None => {
                    self.report(line, format!("unknown condition {name}"))?;
                    *patched = true;
                }
            }
        }
    }

    fn parse_raw_args(&mut self, check: &TaskParamCheck) -> Result<Vec<RawValue>> {
        let had_eq = self.eat_punct('=') || self.eat_punct(':');
        if let Some(close) = self.eat_open() {
            return self.parse_value_list(close);
        }
        let expected = check.len();
        let null_only = check.kinds() == [ParamKind::Null];
        if !had_eq && (expected == 0 || null_only) {
            return Ok(Vec::new());
        }
        if expected >= 2 {
            let line = self.line();
            return Err(self.syntax(
                line,
                format!("{expected} parameters must be enclosed in ( ) or [ ]"),
            ));
        }
        Ok(vec![self.parse_value()?])
    }

    fn parse_value_list(&mut self, close: char) -> Result<Vec<RawValue>> {
        let mut out = Vec::new();
        loop {
            if self.eat_punct(close) {
                return Ok(out);
            }
            if self.eat_punct(',') {
                continue;
            }
            out.push(self.parse_value()?);
        }
    }

    fn parse_value(&mut self) -> Result<RawValue> {
        let tok = self.next_token("a value")?;
        match tok.lexeme {
            Lexeme::Quoted(text) => Ok(RawValue {
                tag: None,
                text,
                line: tok.line,
            }),
            Lexeme::Word(word) => {
                if !self.eat_punct(':') {
                    return Ok(RawValue {
                        tag: None,
                        text: word,
                        line: tok.line,
                    });
                }
                let inner = self.next_token("a tagged value")?;
                match inner.lexeme {
                    Lexeme::Word(text) | Lexeme::Quoted(text) => Ok(RawValue {
                        tag: Some(word),
                        text,
                        line: tok.line,
                    }),
                    Lexeme::Punct(c) => Err(self.syntax(
                        inner.line,
                        format!("expected a value after {word}:, found '{c}'"),
                    )),
                }
            }
            Lexeme::Punct(c) => {
                Err(self.syntax(tok.line, format!("expected a value, found '{c}'")))
            }
        }
    }

    // -- values -------------------------------------------------------------

    fn convert(&self, slot: ParamKind, raw: &RawValue) -> std::result::Result<TaskData, String> {
        let mut kind = slot;
        if let Some(tag) = &raw.tag {
            let tagged = tag_kind(tag).ok_or_else(|| format!("unknown value tag {tag}"))?;
            let fits = tagged == slot
                || (slot == ParamKind::Num && matches!(tagged, ParamKind::Int | ParamKind::Float));
            if !fits {
                return Err(format!("expected {slot:?} but found {tag}:{}", raw.text));
            }
            kind = tagged;
        }

        let text = raw.text.as_str();
        match kind {
            ParamKind::Null => ["void", "null", "none", "empty"]
                .iter()
                .any(|n| n.eq_ignore_ascii_case(text))
                .then_some(TaskData::None)
                .ok_or_else(|| format!("expected an empty value, found {text}")),
            ParamKind::Num => {
                if !is_number(text, true) {
                    return Err(format!("expected a number, found {text}"));
                }
                if text.contains('.') {
                    parse_float(text)
                } else {
                    parse_int(text)
                }
            }
            ParamKind::Int => parse_int(text),
            ParamKind::Float => parse_float(text),
            ParamKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(TaskData::Bool(true)),
                "false" | "0" => Ok(TaskData::Bool(false)),
                _ => Err(format!("expected True/False/1/0, found {text}")),
            },
            ParamKind::String => {
                let max = self.cx.limits.max_string_len;
                if text.chars().count() > max {
                    Err(format!("string longer than {max} characters"))
                } else {
                    Ok(TaskData::String(text.to_string()))
                }
            }
            ParamKind::Activity => {
                let act = Activity::from_name(text);
                if act.is_valid() {
                    Ok(TaskData::Activity(act))
                } else {
                    text.parse::<i32>()
                        .map(|n| TaskData::Activity(Activity(n)))
                        .map_err(|_| format!("unknown activity {text}"))
                }
            }
            ParamKind::NpcState => NpcState::from_name(strip_prefix_ci(text, "NPC_STATE_"))
                .map(TaskData::NpcState)
                .ok_or_else(|| format!("unknown state {text}")),
            ParamKind::Memory => MemoryFlags::from_name(strip_prefix_ci(text, "MEMORY_"))
                .map(TaskData::Memory)
                .ok_or_else(|| format!("unknown memory flag {text}")),
            ParamKind::Path => PathType::from_name(strip_prefix_ci(text, "PATH_"))
                .map(TaskData::Path)
                .ok_or_else(|| format!("unknown path kind {text}")),
            ParamKind::Goal => GoalType::from_name(strip_prefix_ci(text, "GOAL_"))
                .map(TaskData::Goal)
                .ok_or_else(|| format!("unknown goal kind {text}")),
            ParamKind::TaskId => self
                .resolve(SymbolKind::Task, text)
                .map(|(id, _)| TaskData::TaskId(id))
                .ok_or_else(|| format!("unknown task {text}")),
            ParamKind::ScheduleId => self
                .resolve(SymbolKind::Schedule, text)
                .map(|(id, _)| TaskData::ScheduleId(id))
                .ok_or_else(|| format!("unknown schedule {text}")),
        }
    }
}

fn describe(lexeme: &Lexeme) -> String {
    match lexeme {
        Lexeme::Word(w) => w.clone(),
        Lexeme::Quoted(q) => format!("\"{q}\""),
        Lexeme::Punct(c) => format!("'{c}'"),
    }
}

fn tag_kind(tag: &str) -> Option<ParamKind> {
    let kind = match tag.to_ascii_lowercase().as_str() {
        "int" => ParamKind::Int,
        "float" => ParamKind::Float,
        "bool" => ParamKind::Bool,
        "string" => ParamKind::String,
        "activity" => ParamKind::Activity,
        "task" => ParamKind::TaskId,
        "schedule" => ParamKind::ScheduleId,
        "state" => ParamKind::NpcState,
        "memory" => ParamKind::Memory,
        "path" => ParamKind::Path,
        "goal" => ParamKind::Goal,
        _ => return None,
    };
    Some(kind)
}

fn strip_prefix_ci<'t>(text: &'t str, prefix: &str) -> &'t str {
    match text.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &text[prefix.len()..],
        _ => text,
    }
}

/// Optional sign, digits, and (if allowed) a single dot.
fn is_number(text: &str, allow_dot: bool) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    let mut dots = 0;
    let mut digits = 0;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' if allow_dot => dots += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

fn parse_int(text: &str) -> std::result::Result<TaskData, String> {
    if !is_number(text, false) {
        return Err(format!("expected an integer, found {text}"));
    }
    text.parse::<i32>()
        .map(TaskData::Int)
        .map_err(|e| format!("bad integer {text}: {e}"))
}

fn parse_float(text: &str) -> std::result::Result<TaskData, String> {
    if !is_number(text, true) {
        return Err(format!("expected a float, found {text}"));
    }
    match text.parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(TaskData::Float(v)),
        Ok(_) => Err(format!("float {text} is out of range")),
        Err(e) => Err(format!("bad float {text}: {e}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        ns: ScheduleNamespaces,
        arena: IdSpaceArena,
        limits: LoaderConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let mut ns = ScheduleNamespaces::new();
            for s in ["SCHED_IDLE", "SCHED_PATROL", "SCHED_FAIL"] {
                ns.add_schedule(s).expect("schedule");
            }
            ns.add_task("TASK_STOP", TaskParamCheck::none()).expect("task");
            ns.add_task("TASK_WAIT", TaskParamCheck::single(ParamKind::Float))
                .expect("task");
            ns.add_task("TASK_SET_SCHEDULE", TaskParamCheck::single(ParamKind::ScheduleId))
                .expect("task");
            ns.add_task("TASK_CLEAR", TaskParamCheck::single(ParamKind::Null))
                .expect("task");
            ns.add_task(
                "TASK_MOVE",
                TaskParamCheck::new(&[ParamKind::Path, ParamKind::Goal, ParamKind::Num])
                    .expect("shape"),
            )
            .expect("task");
            ns.add_task("TASK_SAY", TaskParamCheck::single(ParamKind::String))
                .expect("task");
            ns.add_condition("COND_SEE_ENEMY").expect("cond");
            ns.add_condition("COND_HEAR_DANGER").expect("cond");
            Self {
                ns,
                arena: IdSpaceArena::new(),
                limits: LoaderConfig::default(),
            }
        }

        fn cx(&self, strict: bool) -> ParseContext<'_> {
            ParseContext {
                class_name: "test",
                class: None,
                namespaces: &self.ns,
                classes: &self.arena,
                limits: &self.limits,
                strict,
            }
        }
    }

    #[test]
    fn parses_full_grammar() {
        let fx = Fixture::new();
        let src = r#"
            // idle forever
            Schedule = SCHED_IDLE
            {
                Tasks
                {
                    TASK_STOP
                    TASK_WAIT 2.5,
                    TASK_WAIT : Float:1
                    TASK_CLEAR = Void
                    TASK_MOVE = [PATH_COVER, GOAL_ENEMY, 3]
                    TASK_MOVE (LOS ENEMY_LKP 1.5)
                    TASK_SAY "hello there"
                    TASK_SET_SCHEDULE = SCHED_PATROL
                }
                Interrupts
                {
                    COND_SEE_ENEMY,
                    COND_HEAR_DANGER
                }
            }
        "#;
        let out = parse_schedules(src, fx.cx(true)).expect("parse");
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.schedules.len(), 1);
        let s = &out.schedules[0];
        assert_eq!(s.name, "SCHED_IDLE");
        assert_eq!(s.tasks.len(), 8);
        assert_eq!(s.tasks[1].arg(0), &TaskData::Float(2.5));
        assert_eq!(s.tasks[2].arg(0), &TaskData::Float(1.0));
        assert_eq!(s.tasks[3].args(), &[TaskData::None]);
        assert_eq!(
            s.tasks[4].args(),
            &[
                TaskData::Path(PathType::Cover),
                TaskData::Goal(GoalType::Enemy),
                TaskData::Int(3)
            ]
        );
        assert_eq!(s.tasks[5].arg(2), &TaskData::Float(1.5));
        assert_eq!(s.tasks[6].arg(0).as_str(), Some("hello there"));
        let patrol = fx.ns.schedule_symbol_to_id("SCHED_PATROL").expect("patrol");
        assert_eq!(s.tasks[7].arg(0), &TaskData::ScheduleId(Id::Global(patrol)));
        assert_eq!(s.interrupts.count(), 2);
        assert!(!s.patched);
    }

    #[test]
    fn schedule_keyword_is_optional() {
        let fx = Fixture::new();
        let out =
            parse_schedules("SCHED_IDLE { Tasks { TASK_STOP } }", fx.cx(true)).expect("parse");
        assert_eq!(out.schedules[0].tasks.len(), 1);
    }

    #[test]
    fn strict_rejects_unknown_task() {
        let fx = Fixture::new();
        let err = parse_schedules("SCHED_IDLE {\n Tasks { TASK_NOPE } }", fx.cx(true))
            .expect_err("unknown");
        match err {
            SchedzError::ScheduleLoad { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("unknown task TASK_NOPE"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn tolerant_substitutes_placeholders() {
        let fx = Fixture::new();
        let src = "SCHED_IDLE { Tasks { TASK_NOPE = 3 TASK_WAIT = abc TASK_STOP } \
                   Interrupts { COND_NOPE COND_SEE_ENEMY } }";
        let out = parse_schedules(src, fx.cx(false)).expect("parse");
        assert_eq!(out.diagnostics.len(), 3);
        let s = &out.schedules[0];
        assert!(s.patched);
        assert!(s.tasks[0].is_placeholder());
        assert_eq!(s.tasks[1].arg(0), &TaskData::None);
        assert_eq!(s.tasks.len(), 3);
        assert_eq!(s.interrupts.count(), 1);
    }

    #[test]
    fn oversized_float_is_reported() {
        let fx = Fixture::new();
        let digits = "9".repeat(40);
        let src = format!("SCHED_IDLE {{ Tasks {{ TASK_WAIT {digits} TASK_WAIT {digits}.5 }} }}");
        let out = parse_schedules(&src, fx.cx(false)).expect("parse");
        assert_eq!(out.diagnostics.len(), 2);
        assert!(out.diagnostics[0].message.contains("out of range"));
        let s = &out.schedules[0];
        assert!(s.patched);
        assert_eq!(s.tasks[0].arg(0), &TaskData::None);
        assert_eq!(s.tasks[1].arg(0), &TaskData::None);

        assert!(parse_schedules(&src, fx.cx(true)).is_err());
    }

    #[test]
    fn arity_mismatch_message() {
        let fx = Fixture::new();
        let out = parse_schedules(
            "SCHED_IDLE { Tasks { TASK_MOVE [PATH_LOS GOAL_ENEMY] } }",
            fx.cx(false),
        )
        .expect("parse");
        assert_eq!(
            out.diagnostics[0].message,
            "3 parameters are expected but found 2"
        );
        assert_eq!(out.schedules[0].tasks[0].arity(), 3);
        assert_eq!(out.schedules[0].tasks[0].arg(2), &TaskData::None);
    }

    #[test]
    fn unknown_schedule_is_skipped_in_tolerant_mode() {
        let fx = Fixture::new();
        let src = "SCHED_GHOST { Tasks { TASK_STOP } } SCHED_IDLE { Tasks { TASK_STOP } }";
        let out = parse_schedules(src, fx.cx(false)).expect("parse");
        assert_eq!(out.schedules.len(), 1);
        assert_eq!(out.schedules[0].name, "SCHED_IDLE");
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn structural_error_keeps_earlier_schedules() {
        let fx = Fixture::new();
        let src = "SCHED_IDLE { Tasks { TASK_STOP } } SCHED_PATROL { Bogus { } }";
        let out = parse_schedules(src, fx.cx(false)).expect("parse");
        assert_eq!(out.schedules.len(), 1);
        assert!(out.diagnostics[0].message.contains("expected Tasks or Interrupts"));
        assert!(parse_schedules(src, fx.cx(true)).is_err());
    }

    #[test]
    fn task_limit_truncates() {
        let mut fx = Fixture::new();
        fx.limits.max_tasks_per_schedule = 2;
        let out = parse_schedules(
            "SCHED_IDLE { Tasks { TASK_STOP TASK_STOP TASK_STOP TASK_STOP } }",
            fx.cx(false),
        )
        .expect("parse");
        assert_eq!(out.schedules[0].tasks.len(), 2);
        assert_eq!(out.diagnostics.len(), 1);
    }

    #[test]
    fn long_strings_are_rejected() {
        let fx = Fixture::new();
        let long = "x".repeat(64);
        let src = format!("SCHED_IDLE {{ Tasks {{ TASK_SAY \"{long}\" }} }}");
        assert!(parse_schedules(&src, fx.cx(true)).is_err());
    }

    #[test]
    fn class_scoped_names_resolve_to_local_ids() {
        let mut fx = Fixture::new();
        let class = fx.arena.register_class("npc_guard", None).expect("class");
        let g = fx
            .arena
            .add_schedule(&mut fx.ns, class, "SCHED_GUARD_POST", 0)
            .expect("schedule");
        fx.arena
            .add_task(&mut fx.ns, class, "TASK_GUARD_SALUTE", 0, TaskParamCheck::none())
            .expect("task");
        let mut cx = fx.cx(true);
        cx.class = Some(class);
        cx.class_name = "npc_guard";

        let out = parse_schedules(
            "SCHED_GUARD_POST { Tasks { TASK_GUARD_SALUTE } }",
            cx,
        )
        .expect("parse");
        assert_eq!(out.schedules[0].id, g);
        assert_eq!(out.schedules[0].tasks[0].id(), Some(Id::local(class, 0)));

        // Globally registered tasks are not visible to the class.
        assert!(parse_schedules("SCHED_GUARD_POST { Tasks { TASK_STOP } }", cx).is_err());
    }

    #[test]
    fn unterminated_string_is_reported() {
        let fx = Fixture::new();
        let out = parse_schedules("SCHED_IDLE { Tasks { TASK_SAY \"oops\n } }", fx.cx(false))
            .expect("tolerant");
        assert!(out.schedules.is_empty());
        assert_eq!(out.diagnostics[0].message, "unterminated string");
    }
}
