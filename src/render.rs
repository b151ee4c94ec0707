use crate::bind::{self, Binding};
use crate::types::{CompiledBody, CompiledSegment, CompiledSlot, Target};
use crate::{CompiledGrammar, RenderError, RenderOptions, RenderValue, RuleHandle};

/// Render `input` starting at `rule`.
///
/// Expansion is driven by an explicit task stack rather than native
/// recursion, so deep inputs are bounded only by `max_depth`. Depth counts
/// rule invocations along the current chain; the starting rule is depth 1.
pub(crate) fn render(
    grammar: &CompiledGrammar,
    rule: &str,
    input: &RenderValue,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    let handle = grammar.handle(rule).ok_or_else(|| RenderError::UnknownRule {
        name: rule.to_owned(),
    })?;
    tracing::debug!(rule, max_depth = options.depth_limit(), "render start");
    let out = Renderer::new(grammar, *options).run(handle, input)?;
    tracing::debug!(rule, bytes = out.len(), "render complete");
    Ok(out)
}

enum Task<'a> {
    Text(&'a str),
    Expand {
        rule: RuleHandle,
        value: &'a RenderValue,
        depth: usize,
        path: usize,
    },
}

/// One step of a data path, linked to its parent in the path arena.
struct PathNode<'a> {
    parent: Option<usize>,
    step: Step<'a>,
}

enum Step<'a> {
    Root(&'a str),
    Field(&'a str),
    Index(usize),
}

struct Renderer<'a> {
    grammar: &'a CompiledGrammar,
    options: RenderOptions,
    paths: Vec<PathNode<'a>>,
    out: String,
}

impl<'a> Renderer<'a> {
    fn new(grammar: &'a CompiledGrammar, options: RenderOptions) -> Self {
        Self {
            grammar,
            options,
            paths: Vec::new(),
            out: String::new(),
        }
    }

    fn run(mut self, root: RuleHandle, input: &'a RenderValue) -> Result<String, RenderError> {
        let root_name = self.grammar.rules[root.0].name.as_str();
        let path = self.push_path(None, Step::Root(root_name));
        let mut stack = vec![Task::Expand {
            rule: root,
            value: input,
            depth: 1,
            path,
        }];

        while let Some(task) = stack.pop() {
            match task {
                Task::Text(text) => self.emit(text)?,
                Task::Expand {
                    rule,
                    value,
                    depth,
                    path,
                } => self.expand(rule, value, depth, path, &mut stack)?,
            }
        }
        Ok(self.out)
    }

    fn emit(&mut self, text: &str) -> Result<(), RenderError> {
        self.out.push_str(text);
        match self.options.output_limit() {
            Some(limit) if self.out.len() > limit => Err(RenderError::OutputLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    /// Select an alternative for `value` and schedule its segments.
    fn expand(
        &mut self,
        handle: RuleHandle,
        value: &'a RenderValue,
        depth: usize,
        path: usize,
        stack: &mut Vec<Task<'a>>,
    ) -> Result<(), RenderError> {
        let grammar = self.grammar;
        let rule = &grammar.rules[handle.0];

        if depth > self.options.depth_limit() {
            return Err(RenderError::RecursionLimitExceeded {
                rule: rule.name.clone(),
                limit: self.options.depth_limit(),
                path: self.path_string(path),
            });
        }

        let alternatives = match &rule.body {
            CompiledBody::Constant(text) => {
                stack.push(Task::Text(text));
                return Ok(());
            }
            CompiledBody::Alternatives(alts) => alts,
        };

        let selection =
            bind::select(alternatives, value).ok_or_else(|| RenderError::NoMatchingAlternative {
                rule: rule.name.clone(),
                path: self.path_string(path),
            })?;
        tracing::trace!(
            rule = rule.name.as_str(),
            alternative = selection.index,
            depth,
            "selected alternative"
        );

        // Build this frame's tasks in order, then push them reversed so the
        // first segment is popped first.
        let mut tasks = Vec::with_capacity(selection.alternative.segments.len());
        let mut bindings = selection.bindings.into_iter();
        for segment in &selection.alternative.segments {
            match segment {
                CompiledSegment::Literal(text) => tasks.push(Task::Text(text)),
                CompiledSegment::Slot(slot) => {
                    if let Some(binding) = bindings.next() {
                        self.slot_tasks(slot, binding, depth, path, &mut tasks);
                    }
                }
            }
        }
        stack.extend(tasks.into_iter().rev());
        Ok(())
    }

    fn slot_tasks(
        &mut self,
        slot: &'a CompiledSlot,
        binding: Binding<'a>,
        depth: usize,
        path: usize,
        tasks: &mut Vec<Task<'a>>,
    ) {
        // Paths are only recorded where a nested rule may report them.
        let is_rule = matches!(slot.target, Target::Rule(_));
        let path = match &slot.name {
            Some(name) if is_rule => self.push_path(Some(path), Step::Field(name)),
            _ => path,
        };
        match binding {
            Binding::Nothing => {}
            Binding::Fixed => {
                if let Some(text) = bind::fixed_text(&slot.target) {
                    tasks.push(Task::Text(text));
                }
            }
            Binding::One(value) => tasks.push(item_task(&slot.target, value, depth, path)),
            Binding::Many(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0
                        && let Some(separator) = slot.modifier.separator()
                    {
                        tasks.push(Task::Text(separator));
                    }
                    let item_path = if is_rule {
                        self.push_path(Some(path), Step::Index(i))
                    } else {
                        path
                    };
                    tasks.push(item_task(&slot.target, item, depth, item_path));
                }
            }
        }
    }

    fn push_path(&mut self, parent: Option<usize>, step: Step<'a>) -> usize {
        self.paths.push(PathNode { parent, step });
        self.paths.len() - 1
    }

    /// Render a path id as `Main.functions[1].body`.
    fn path_string(&self, id: usize) -> String {
        let mut steps = Vec::new();
        let mut cursor = Some(id);
        while let Some(i) = cursor {
            let node = &self.paths[i];
            steps.push(&node.step);
            cursor = node.parent;
        }
        let mut out = String::new();
        for step in steps.into_iter().rev() {
            match step {
                Step::Root(name) => out.push_str(name),
                Step::Field(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                Step::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

fn item_task<'a>(target: &Target, value: &'a RenderValue, depth: usize, path: usize) -> Task<'a> {
    match target {
        // The resolver only binds scalars to primitive targets.
        Target::Primitive(_) => Task::Text(value.as_scalar().unwrap_or_default()),
        Target::Rule(handle) => Task::Expand {
            rule: *handle,
            value,
            depth: depth + 1,
            path,
        },
    }
}
