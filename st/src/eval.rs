//! Tree-walking evaluator
//!
//! One `Evaluator` is created per render. It borrows the registry, policy
//! and context, owns the local scopes and the output buffer, and is
//! dropped with the buffer on the first error.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::ast::{BinaryOp, Expr, ExprKind, LoopTarget, Node, TestKind, UnaryOp};
use crate::environment::{AutoEscape, Policy};
use crate::error::RenderError;
use crate::escape::html_escape;
use crate::filters::{FilterError, FilterRegistry};
use crate::value::{
    RenderContext, as_integer, compare, contains, display, float, get_attr, get_item, is_truthy, type_name,
    values_equal,
};

/// Filters whose output is not escaped again under `AutoEscape::Html`
const ESCAPE_EXEMPT: &[&str] = &["safe", "escape", "e"];

pub(crate) struct Evaluator<'a> {
    registry: &'a FilterRegistry,
    policy: &'a Policy,
    context: &'a RenderContext,
    scopes: Vec<HashMap<String, Value>>,
    iterations: usize,
    line: usize,
    out: String,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(registry: &'a FilterRegistry, policy: &'a Policy, context: &'a RenderContext) -> Self {
        Self {
            registry,
            policy,
            context,
            scopes: vec![HashMap::new()],
            iterations: 0,
            line: 1,
            out: String::new(),
        }
    }

    pub(crate) fn render(mut self, nodes: &[Node]) -> Result<String, RenderError> {
        self.render_nodes(nodes)?;
        Ok(self.out)
    }

    // === Statements ===

    fn render_nodes(&mut self, nodes: &[Node]) -> Result<(), RenderError> {
        for node in nodes {
            self.render_node(node)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node) -> Result<(), RenderError> {
        match node {
            Node::Text(text) => self.write(text),
            Node::Output { expr, span } => {
                self.line = span.line;
                let value = self.eval(expr)?;
                let text = display(&value);
                let escape = self.policy.auto_escape == AutoEscape::Html
                    && !expr.outer_filter().is_some_and(|name| ESCAPE_EXEMPT.contains(&name));
                if escape {
                    self.write(&html_escape(&text))
                } else {
                    self.write(&text)
                }
            }
            Node::If { branches, otherwise } => {
                for (condition, body) in branches {
                    self.line = condition.span.line;
                    if is_truthy(&self.eval(condition)?) {
                        return self.render_nodes(body);
                    }
                }
                self.render_nodes(otherwise)
            }
            Node::For {
                target,
                iter,
                body,
                otherwise,
                span,
            } => {
                self.line = span.line;
                self.render_for(target, iter, body, otherwise)
            }
            Node::Set { name, value } => {
                let value = self.eval(value)?;
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone(), value);
                }
                Ok(())
            }
        }
    }

    fn render_for(
        &mut self,
        target: &LoopTarget,
        iter: &Expr,
        body: &[Node],
        otherwise: &[Node],
    ) -> Result<(), RenderError> {
        let line = iter.span.line;
        let items = self.iteration_items(self.eval(iter)?, target, line)?;
        if items.is_empty() {
            return self.render_nodes(otherwise);
        }

        let length = items.len();
        for (index, item) in items.into_iter().enumerate() {
            self.iterations += 1;
            if self.iterations > self.policy.limits.max_iterations {
                return Err(RenderError::LimitExceeded {
                    limit: format!("max-iterations ({})", self.policy.limits.max_iterations),
                    line,
                });
            }

            let mut scope = HashMap::new();
            match target {
                LoopTarget::Single(name) => {
                    scope.insert(name.clone(), item);
                }
                LoopTarget::Pair(first, second) => {
                    let (a, b) = unpack_pair(item, line)?;
                    scope.insert(first.clone(), a);
                    scope.insert(second.clone(), b);
                }
            }
            scope.insert("loop".to_string(), loop_info(index, length));

            self.scopes.push(scope);
            self.render_nodes(body)?;
            self.scopes.pop();
        }
        Ok(())
    }

    fn iteration_items(&self, iterable: Value, target: &LoopTarget, line: usize) -> Result<Vec<Value>, RenderError> {
        match iterable {
            Value::Array(items) => Ok(items),
            Value::Object(map) => Ok(match target {
                LoopTarget::Single(_) => map.into_iter().map(|(k, _)| Value::String(k)).collect(),
                LoopTarget::Pair(_, _) => map
                    .into_iter()
                    .map(|(k, v)| Value::Array(vec![Value::String(k), v]))
                    .collect(),
            }),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            other => Err(RenderError::TypeMismatch {
                message: format!("cannot iterate over {}", type_name(&other)),
                line,
            }),
        }
    }

    fn write(&mut self, text: &str) -> Result<(), RenderError> {
        if self.out.len() + text.len() > self.policy.limits.max_output_bytes {
            return Err(RenderError::LimitExceeded {
                limit: format!("max-output-bytes ({})", self.policy.limits.max_output_bytes),
                line: self.line,
            });
        }
        self.out.push_str(text);
        Ok(())
    }

    /// Strings built while evaluating are held to the output bound
    fn check_string_size(&self, len: usize, line: usize) -> Result<(), RenderError> {
        if len > self.policy.limits.max_output_bytes {
            return Err(RenderError::LimitExceeded {
                limit: format!("max-output-bytes ({})", self.policy.limits.max_output_bytes),
                line,
            });
        }
        Ok(())
    }

    // === Expressions ===

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.context.get(name))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, RenderError> {
        let line = expr.span.line;
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::List(items) => Ok(Value::Array(self.eval_all(items)?)),
            ExprKind::Map(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::String(s) => s,
                        k @ (Value::Number(_) | Value::Bool(_)) => display(&k),
                        other => {
                            return Err(RenderError::TypeMismatch {
                                message: format!("map keys must be strings, got {}", type_name(&other)),
                                line,
                            });
                        }
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(Value::Object(map))
            }
            ExprKind::Var(name) => self.lookup(name).cloned().ok_or_else(|| RenderError::UndefinedVariable {
                name: name.clone(),
                line,
            }),
            ExprKind::Attr { target, name } => {
                let value = self.eval(target)?;
                get_attr(&value, name)
                    .cloned()
                    .ok_or_else(|| RenderError::UndefinedAttribute {
                        target: target.describe(),
                        attr: name.clone(),
                        line,
                    })
            }
            ExprKind::Index { target, index } => {
                let value = self.eval(target)?;
                let index = self.eval(index)?;
                get_item(&value, &index).ok_or_else(|| RenderError::UndefinedAttribute {
                    target: target.describe(),
                    attr: display(&index),
                    line,
                })
            }
            ExprKind::Filter { target, name, args } => {
                let filter = self.registry.filter(name).ok_or_else(|| RenderError::UnknownFilter {
                    name: name.clone(),
                    line,
                })?;
                let input = match self.eval(target) {
                    Ok(value) => value,
                    Err(e) if e.is_undefined() && filter.accepts_undefined() => Value::Null,
                    Err(e) => return Err(e),
                };
                let args = self.eval_all(args)?;
                filter
                    .apply(&input, &args)
                    .map_err(|e| filter_error(name, e, line))
            }
            ExprKind::Call { name, args } => {
                let function = self.registry.function(name).ok_or_else(|| RenderError::UnknownFunction {
                    name: name.clone(),
                    line,
                })?;
                let args = self.eval_all(args)?;
                function.call(&args).map_err(|e| filter_error(name, e, line))
            }
            ExprKind::Test { target, test, negated } => {
                let result = self.eval_test(target, *test, line)?;
                Ok(Value::Bool(result != *negated))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                    UnaryOp::Neg => match Num::from_value(&value) {
                        Some(Num::Int(i)) => Ok(i.checked_neg().map(Value::from).unwrap_or_else(|| float(-(i as f64)))),
                        Some(Num::Float(f)) => Ok(float(-f)),
                        None => Err(RenderError::TypeMismatch {
                            message: format!("cannot negate {}", type_name(&value)),
                            line,
                        }),
                    },
                }
            }
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right, line),
            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if is_truthy(&self.eval(condition)?) {
                    self.eval(then)
                } else {
                    match otherwise {
                        Some(otherwise) => self.eval(otherwise),
                        None => Ok(Value::Null),
                    }
                }
            }
        }
    }

    fn eval_all(&self, exprs: &[Expr]) -> Result<Vec<Value>, RenderError> {
        exprs.iter().map(|e| self.eval(e)).collect()
    }

    fn eval_test(&self, target: &Expr, test: TestKind, line: usize) -> Result<bool, RenderError> {
        if matches!(test, TestKind::Defined | TestKind::Undefined) {
            let defined = match self.eval(target) {
                Ok(_) => true,
                Err(e) if e.is_undefined() => false,
                Err(e) => return Err(e),
            };
            return Ok(defined == (test == TestKind::Defined));
        }

        let value = self.eval(target)?;
        Ok(match test {
            TestKind::None => value.is_null(),
            TestKind::String => value.is_string(),
            TestKind::Number => value.is_number(),
            TestKind::Boolean => value.is_boolean(),
            TestKind::Mapping => value.is_object(),
            TestKind::Sequence => value.is_array() || value.is_string(),
            TestKind::Even | TestKind::Odd => {
                let n = as_integer(&value).ok_or_else(|| RenderError::TypeMismatch {
                    message: format!("even/odd tests need an integer, got {}", type_name(&value)),
                    line,
                })?;
                (n % 2 == 0) == (test == TestKind::Even)
            }
            TestKind::Defined | TestKind::Undefined => unreachable!("handled above"),
        })
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, line: usize) -> Result<Value, RenderError> {
        // `and` / `or` short-circuit and yield an operand, as in Jinja
        match op {
            BinaryOp::And => {
                let l = self.eval(left)?;
                return if is_truthy(&l) { self.eval(right) } else { Ok(l) };
            }
            BinaryOp::Or => {
                let l = self.eval(left)?;
                return if is_truthy(&l) { Ok(l) } else { self.eval(right) };
            }
            _ => {}
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        let mismatch = |verb: &str| RenderError::TypeMismatch {
            message: format!("cannot {} {} and {}", verb, type_name(&l), type_name(&r)),
            line,
        };

        match op {
            BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
            BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ord = compare(&l, &r).ok_or_else(|| mismatch("compare"))?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                }))
            }
            BinaryOp::In | BinaryOp::NotIn => {
                let found = contains(&r, &l).ok_or_else(|| RenderError::TypeMismatch {
                    message: format!("'in' needs a string, list or map on the right, got {}", type_name(&r)),
                    line,
                })?;
                Ok(Value::Bool(found == (op == BinaryOp::In)))
            }
            BinaryOp::Concat => {
                let (a, b) = (display(&l), display(&r));
                self.check_string_size(a.len().saturating_add(b.len()), line)?;
                Ok(Value::String(a + &b))
            }
            BinaryOp::Add => match (&l, &r) {
                (Value::String(a), Value::String(b)) => {
                    self.check_string_size(a.len().saturating_add(b.len()), line)?;
                    Ok(Value::String(format!("{}{}", a, b)))
                }
                (Value::Array(a), Value::Array(b)) => {
                    let len = a.len().saturating_add(b.len());
                    if len > self.policy.limits.max_range {
                        return Err(RenderError::LimitExceeded {
                            limit: format!("list of {} items exceeds max-range ({})", len, self.policy.limits.max_range),
                            line,
                        });
                    }
                    Ok(Value::Array(a.iter().chain(b).cloned().collect()))
                }
                _ => arithmetic(op, &l, &r).ok_or_else(|| mismatch("add")),
            },
            BinaryOp::Mul => match (&l, &r) {
                (Value::String(s), n @ Value::Number(_)) | (n @ Value::Number(_), Value::String(s)) => {
                    let times = as_integer(n).ok_or_else(|| mismatch("multiply"))?.max(0) as usize;
                    self.check_string_size(s.len().saturating_mul(times), line)?;
                    Ok(Value::String(s.repeat(times)))
                }
                _ => arithmetic(op, &l, &r).ok_or_else(|| mismatch("multiply")),
            },
            BinaryOp::Sub => arithmetic(op, &l, &r).ok_or_else(|| mismatch("subtract")),
            BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Rem => {
                let is_zero = Num::from_value(&r).is_some_and(|n| n.is_zero());
                if is_zero && Num::from_value(&l).is_some() {
                    return Err(RenderError::TypeMismatch {
                        message: "division by zero".to_string(),
                        line,
                    });
                }
                arithmetic(op, &l, &r).ok_or_else(|| mismatch("divide"))
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("short-circuited above"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Num::Int).or_else(|| n.as_f64().map(Num::Float)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(i) => i == 0,
            Num::Float(f) => f == 0.0,
        }
    }
}

/// Numeric binary operators; integer arithmetic falls back to floats on overflow.
/// Floor division and remainder round toward negative infinity.
fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    let (l, r) = (Num::from_value(left)?, Num::from_value(right)?);

    if let (Num::Int(a), Num::Int(b)) = (l, r) {
        let exact = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::FloorDiv => a.checked_div(b).map(|q| if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q }),
            BinaryOp::Rem => a.checked_rem(b).map(|m| if m != 0 && (m < 0) != (b < 0) { m + b } else { m }),
            _ => None,
        };
        if let Some(v) = exact {
            return Some(Value::from(v));
        }
    }

    let (a, b) = (l.as_f64(), r.as_f64());
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::FloorDiv => (a / b).floor(),
        BinaryOp::Rem => {
            let m = a % b;
            if m != 0.0 && (m < 0.0) != (b < 0.0) { m + b } else { m }
        }
        _ => return None,
    };
    Some(float(result))
}

fn unpack_pair(item: Value, line: usize) -> Result<(Value, Value), RenderError> {
    match item {
        Value::Array(mut pair) if pair.len() == 2 => {
            let second = pair.pop().unwrap_or(Value::Null);
            let first = pair.pop().unwrap_or(Value::Null);
            Ok((first, second))
        }
        other => Err(RenderError::TypeMismatch {
            message: format!("cannot unpack {} into two loop variables", type_name(&other)),
            line,
        }),
    }
}

fn loop_info(index: usize, length: usize) -> Value {
    let mut info = Map::new();
    info.insert("index".to_string(), Value::from(index + 1));
    info.insert("index0".to_string(), Value::from(index));
    info.insert("revindex".to_string(), Value::from(length - index));
    info.insert("revindex0".to_string(), Value::from(length - index - 1));
    info.insert("first".to_string(), Value::Bool(index == 0));
    info.insert("last".to_string(), Value::Bool(index + 1 == length));
    info.insert("length".to_string(), Value::from(length));
    Value::Object(info)
}

fn filter_error(name: &str, err: FilterError, line: usize) -> RenderError {
    match err {
        FilterError::PolicyViolation { message } => RenderError::PolicyViolation {
            filter: name.to_string(),
            message,
            line,
        },
        FilterError::LimitExceeded(limit) => RenderError::LimitExceeded { limit, line },
        other => RenderError::Filter {
            name: name.to_string(),
            message: other.to_string(),
            line,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Limits;
    use crate::template::compile;
    use serde_json::json;

    fn render_with(source: &str, ctx: Value, policy: Policy) -> Result<String, RenderError> {
        let registry = FilterRegistry::standard();
        let template = compile(source).unwrap();
        let ctx = match ctx {
            Value::Object(map) => map,
            _ => RenderContext::new(),
        };
        Evaluator::new(&registry, &policy, &ctx).render(template.body())
    }

    fn render(source: &str, ctx: Value) -> Result<String, RenderError> {
        render_with(source, ctx, Policy::default())
    }

    #[test]
    fn test_text_and_variables() {
        assert_eq!(render("Hello, {{ name }}!", json!({"name": "Ada"})).unwrap(), "Hello, Ada!");
        assert_eq!(render("{{ user.name }}", json!({"user": {"name": "Bo"}})).unwrap(), "Bo");
        assert_eq!(render("{{ items[1] }}", json!({"items": ["a", "b"]})).unwrap(), "b");
    }

    #[test]
    fn test_undefined_is_an_error() {
        let err = render("{{ missing }}", json!({})).unwrap_err();
        assert_eq!(
            err,
            RenderError::UndefinedVariable {
                name: "missing".to_string(),
                line: 1
            }
        );

        let err = render("{{ user.__class__ }}", json!({"user": {}})).unwrap_err();
        assert!(matches!(err, RenderError::UndefinedAttribute { ref attr, .. } if attr == "__class__"));
    }

    #[test]
    fn test_defined_tests_and_default() {
        assert_eq!(render("{{ x is defined }}", json!({})).unwrap(), "false");
        assert_eq!(render("{{ x is undefined }}", json!({})).unwrap(), "true");
        assert_eq!(render("{{ x.y is defined }}", json!({"x": {}})).unwrap(), "false");
        assert_eq!(render("{{ x | default('anon') }}", json!({})).unwrap(), "anon");
        assert_eq!(render("{{ x | d('anon') }}", json!({"x": null})).unwrap(), "anon");
    }

    #[test]
    fn test_if_elif_else() {
        let src = "{% if n > 10 %}big{% elif n > 5 %}mid{% else %}small{% endif %}";
        assert_eq!(render(src, json!({"n": 20})).unwrap(), "big");
        assert_eq!(render(src, json!({"n": 7})).unwrap(), "mid");
        assert_eq!(render(src, json!({"n": 1})).unwrap(), "small");
    }

    #[test]
    fn test_for_loop_variables() {
        let src = "{% for x in items %}{{ loop.index }}:{{ x }}{% if not loop.last %},{% endif %}{% endfor %}";
        assert_eq!(render(src, json!({"items": ["a", "b", "c"]})).unwrap(), "1:a,2:b,3:c");
    }

    #[test]
    fn test_for_else_and_pairs() {
        assert_eq!(
            render("{% for x in items %}{{ x }}{% else %}none{% endfor %}", json!({"items": []})).unwrap(),
            "none"
        );
        assert_eq!(
            render("{% for k, v in m %}{{ k }}={{ v }};{% endfor %}", json!({"m": {"a": 1, "b": 2}})).unwrap(),
            "a=1;b=2;"
        );
        assert_eq!(
            render("{% for k, v in m | items %}{{ k }}{% endfor %}", json!({"m": {"a": 1}})).unwrap(),
            "a"
        );
    }

    #[test]
    fn test_set_is_scoped_to_loop_body() {
        let src = "{% set x = 1 %}{% for i in [1, 2] %}{% set x = i * 10 %}{{ x }} {% endfor %}{{ x }}";
        assert_eq!(render(src, json!({})).unwrap(), "10 20 1");
    }

    #[test]
    fn test_set_shadows_context_without_mutating_it() {
        let src = "{% set name = 'local' %}{{ name }}";
        let registry = FilterRegistry::standard();
        let policy = Policy::default();
        let template = compile(src).unwrap();
        let ctx = match json!({"name": "ctx"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let out = Evaluator::new(&registry, &policy, &ctx).render(template.body()).unwrap();
        assert_eq!(out, "local");
        assert_eq!(ctx.get("name"), Some(&json!("ctx")));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(render("{{ 1 + 2 * 3 }}", json!({})).unwrap(), "7");
        assert_eq!(render("{{ 7 / 2 }}", json!({})).unwrap(), "3.5");
        assert_eq!(render("{{ -7 // 2 }}", json!({})).unwrap(), "-4");
        assert_eq!(render("{{ -7 % 3 }}", json!({})).unwrap(), "2");
        assert_eq!(render("{{ 'ab' * 3 }}", json!({})).unwrap(), "ababab");
        assert_eq!(render("{{ 'a' ~ 1 ~ true }}", json!({})).unwrap(), "a1true");
        assert_eq!(render("{{ [1] + [2] }}", json!({})).unwrap(), "[1,2]");
    }

    #[test]
    fn test_division_by_zero() {
        let err = render("{{ 1 / 0 }}", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::TypeMismatch { ref message, .. } if message == "division by zero"));
        assert!(render("{{ 5 % 0 }}", json!({})).is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let err = render("{{ 'a' - 1 }}", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::TypeMismatch { .. }));
        assert!(render("{{ 'a' < 1 }}", json!({})).is_err());
        assert!(render("{% for x in 5 %}{% endfor %}", json!({})).is_err());
    }

    #[test]
    fn test_and_or_return_operands() {
        assert_eq!(render("{{ name or 'anon' }}", json!({"name": ""})).unwrap(), "anon");
        assert_eq!(render("{{ a and b }}", json!({"a": 1, "b": "yes"})).unwrap(), "yes");
        // the right side is never evaluated
        assert_eq!(render("{{ false and missing }}", json!({})).unwrap(), "false");
    }

    #[test]
    fn test_membership_and_tests() {
        assert_eq!(render("{{ 'b' in items }}", json!({"items": ["a", "b"]})).unwrap(), "true");
        assert_eq!(render("{{ 'z' not in 'abc' }}", json!({})).unwrap(), "true");
        assert_eq!(render("{{ 4 is even }}-{{ 3 is odd }}-{{ 3 is not even }}", json!({})).unwrap(), "true-true-true");
        assert_eq!(render("{{ x is mapping }}", json!({"x": {}})).unwrap(), "true");
        assert_eq!(render("{{ x is none }}", json!({"x": null})).unwrap(), "true");
    }

    #[test]
    fn test_conditional_expression() {
        assert_eq!(render("{{ 'y' if ok else 'n' }}", json!({"ok": true})).unwrap(), "y");
        assert_eq!(render("[{{ 'y' if ok }}]", json!({"ok": false})).unwrap(), "[]");
    }

    #[test]
    fn test_display_of_values() {
        assert_eq!(render("{{ none }}|{{ true }}|{{ [1, 'a'] }}", json!({})).unwrap(), "|true|[1,\"a\"]");
    }

    #[test]
    fn test_unknown_filter_and_function() {
        let err = render("line\n{{ x | system }}", json!({"x": 1})).unwrap_err();
        assert_eq!(
            err,
            RenderError::UnknownFilter {
                name: "system".to_string(),
                line: 2
            }
        );

        let err = render("{{ open('/etc/passwd') }}", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::UnknownFunction { ref name, .. } if name == "open"));
    }

    #[test]
    fn test_unknown_filter_reported_before_target() {
        let err = render("{{ missing | nope }}", json!({})).unwrap_err();
        assert!(matches!(err, RenderError::UnknownFilter { .. }));
    }

    #[test]
    fn test_iteration_limit() {
        let policy = Policy {
            limits: Limits {
                max_iterations: 5,
                ..Limits::default()
            },
            ..Policy::default()
        };
        let src = "{% for i in range(3) %}{% for j in range(3) %}.{% endfor %}{% endfor %}";
        let err = render_with(src, json!({}), policy).unwrap_err();
        assert!(matches!(err, RenderError::LimitExceeded { ref limit, .. } if limit.contains("max-iterations")));
    }

    #[test]
    fn test_output_limit() {
        let policy = Policy {
            limits: Limits {
                max_output_bytes: 10,
                ..Limits::default()
            },
            ..Policy::default()
        };
        assert!(render_with("0123456789", json!({}), policy).is_ok());
        let err = render_with("{{ 'x' * 11 }}", json!({}), policy).unwrap_err();
        assert!(matches!(err, RenderError::LimitExceeded { .. }));
        let err = render_with("{% for i in range(4) %}abc{% endfor %}", json!({}), policy).unwrap_err();
        assert!(matches!(err, RenderError::LimitExceeded { ref limit, .. } if limit.contains("max-output-bytes")));
    }

    #[test]
    fn test_built_strings_are_bounded() {
        let src = "{{ ('a' * 10000) | replace('a', 'a' * 10000) | length }}";
        let err = render(src, json!({})).unwrap_err();
        assert!(matches!(err, RenderError::LimitExceeded { ref limit, .. } if limit.contains("max-output-bytes")));

        let doubling = format!("{{% set s = 'x' * 1000 %}}{}{{{{ s | length }}}}", "{% set s = s ~ s %}".repeat(20));
        let err = render(&doubling, json!({})).unwrap_err();
        assert!(matches!(err, RenderError::LimitExceeded { .. }));

        let lists = format!("{{% set l = range(1000) %}}{}", "{% set l = l + l %}".repeat(20));
        let err = render(&lists, json!({})).unwrap_err();
        assert!(matches!(err, RenderError::LimitExceeded { ref limit, .. } if limit.contains("max-range")));
    }

    #[test]
    fn test_html_escape_policy() {
        let policy = Policy {
            auto_escape: AutoEscape::Html,
            ..Policy::default()
        };
        assert_eq!(
            render_with("<p>{{ x }}</p>", json!({"x": "<b>"}), policy).unwrap(),
            "<p>&lt;b&gt;</p>"
        );
        // already escaped once by the filter
        assert_eq!(
            render_with("{{ x | e }}", json!({"x": "&"}), policy).unwrap(),
            "&amp;"
        );
    }

    #[test]
    fn test_map_literal_and_attribute() {
        assert_eq!(render("{{ {'a': 1}.a }}", json!({})).unwrap(), "1");
        assert_eq!(render("{{ {'a': 1}['a'] }}", json!({})).unwrap(), "1");
    }
}
