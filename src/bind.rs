use crate::types::{CompiledAlternative, CompiledSegment, CompiledSlot, Target};
use crate::{Modifier, RenderValue};

/// What one placeholder of the selected alternative is bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Binding<'v> {
    One(&'v RenderValue),
    Many(&'v [RenderValue]),
    /// An optional placeholder with no value; renders nothing.
    Nothing,
    /// An unnamed `kw[..]` or `sym[..]`; renders its text without input.
    Fixed,
}

/// The binding frame of one rule invocation: the first alternative whose
/// placeholders the input satisfies, with one binding per placeholder in
/// segment order.
#[derive(Debug)]
pub(crate) struct Selection<'g, 'v> {
    pub(crate) index: usize,
    pub(crate) alternative: &'g CompiledAlternative,
    pub(crate) bindings: Vec<Binding<'v>>,
}

/// Pick the first alternative, in declaration order, that `value` satisfies.
pub(crate) fn select<'g, 'v>(
    alternatives: &'g [CompiledAlternative],
    value: &'v RenderValue,
) -> Option<Selection<'g, 'v>> {
    alternatives.iter().enumerate().find_map(|(index, alternative)| {
        bind_alternative(alternative, value).map(|bindings| Selection {
            index,
            alternative,
            bindings,
        })
    })
}

fn bind_alternative<'v>(
    alternative: &CompiledAlternative,
    value: &'v RenderValue,
) -> Option<Vec<Binding<'v>>> {
    alternative
        .segments
        .iter()
        .filter_map(|segment| match segment {
            CompiledSegment::Slot(slot) => Some(slot),
            CompiledSegment::Literal(_) => None,
        })
        .map(|slot| bind_slot(slot, value))
        .collect()
}

/// Bind one placeholder against the value of the enclosing rule. Named
/// placeholders read the record field of that name; unnamed ones take the
/// value itself.
fn bind_slot<'v>(slot: &CompiledSlot, value: &'v RenderValue) -> Option<Binding<'v>> {
    let field = match &slot.name {
        Some(name) => value.get(name),
        None if fixed_text(&slot.target).is_some() => return Some(Binding::Fixed),
        None => Some(value),
    };
    match &slot.modifier {
        Modifier::Once => {
            let v = field.filter(|v| !v.is_absent())?;
            compatible(&slot.target, v).then_some(Binding::One(v))
        }
        Modifier::Optional => match field {
            None | Some(RenderValue::Absent) => Some(Binding::Nothing),
            Some(v) => compatible(&slot.target, v).then_some(Binding::One(v)),
        },
        Modifier::ZeroOrMore | Modifier::OneOrMore | Modifier::OneOrMoreSeparated { .. } => {
            let items = field?.as_sequence()?;
            let ok = items.len() >= slot.modifier.min_len()
                && items.iter().all(|item| compatible(&slot.target, item));
            ok.then_some(Binding::Many(items))
        }
    }
}

pub(crate) fn fixed_text(target: &Target) -> Option<&str> {
    match target {
        Target::Primitive(kind) => kind.fixed_text(),
        Target::Rule(_) => None,
    }
}

/// Shallow shape check. Nested rules are matched when they are expanded.
fn compatible(target: &Target, value: &RenderValue) -> bool {
    match target {
        Target::Primitive(kind) => value.as_scalar().is_some_and(|text| kind.accepts(text)),
        Target::Rule(_) => !value.is_absent(),
    }
}
