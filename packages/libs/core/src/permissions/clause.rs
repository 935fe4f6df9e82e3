//! 권한 절(Clause) 대수
//!
//! 하나의 operation을 role별로 가드하는 boolean 조건 트리입니다.
//!
//! - `Open`: 세션과 무관한 row 조건 (예: `int1 >= 10`)
//! - `Checked`: row 컬럼과 세션 속성 비교 (예: `owner == session.actor_id`)
//! - `Expr`: CEL 자유 표현식 (bool 평가 전용, 필터 변환 불가)
//! - `And` / `Or`: 하위 절 결합
//!
//! 절은 불변이며 `and`/`or`로만 새 절을 합성합니다. `evaluate`는
//! (세션, row)에 대한 순수 함수이고, list 계열에서는 `to_filter`로
//! 파라미터 바인딩된 필터 조각을 생성합니다.

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, Program};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::context::{Row, Session, SessionAttr};
use crate::error::{Error, Result};

/// 권한 절
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clause {
    /// 세션 독립적인 row 조건
    Open(OpenClause),

    /// row 컬럼 ↔ 세션 속성 비교
    Checked(CheckedClause),

    /// CEL 표현식 (bool 평가 전용)
    Expr(String),

    /// 모든 하위 절이 참이어야 함
    And(Vec<Clause>),

    /// 하나 이상의 하위 절이 참이면 됨
    Or(Vec<Clause>),
}

/// Open 절: row 컬럼과 상수 비교
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenClause {
    /// 대상 컬럼
    pub column: String,

    /// 비교 연산자 (기본: eq)
    #[serde(default)]
    pub op: CompareOp,

    /// 비교 상수
    pub value: Value,
}

/// Checked 절: row 컬럼과 세션 속성 비교
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckedClause {
    /// 대상 컬럼
    pub column: String,

    /// 비교할 세션 속성
    pub attr: SessionAttr,
}

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[default]
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
}

impl CompareOp {
    /// SQL 연산자 표기
    pub fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::In => "= ANY",
            CompareOp::NotIn => "<> ALL",
            CompareOp::Like => "LIKE",
        }
    }
}

impl Clause {
    /// Open 절 생성
    pub fn open(column: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Clause::Open(OpenClause {
            column: column.into(),
            op,
            value,
        })
    }

    /// Checked 절 생성
    pub fn checked(column: impl Into<String>, attr: SessionAttr) -> Self {
        Clause::Checked(CheckedClause {
            column: column.into(),
            attr,
        })
    }

    /// CEL 표현식 절 생성
    pub fn expr(source: impl Into<String>) -> Self {
        Clause::Expr(source.into())
    }

    /// AND 합성 (기존 절은 그대로, 새 절 반환)
    pub fn and(self, other: Clause) -> Self {
        match self {
            Clause::And(mut children) => {
                children.push(other);
                Clause::And(children)
            }
            first => Clause::And(vec![first, other]),
        }
    }

    /// OR 합성
    pub fn or(self, other: Clause) -> Self {
        match self {
            Clause::Or(mut children) => {
                children.push(other);
                Clause::Or(children)
            }
            first => Clause::Or(vec![first, other]),
        }
    }

    /// (세션, row)에 대한 순수 boolean 평가
    ///
    /// AND는 첫 false에서, OR는 첫 true에서 단락 평가합니다.
    /// 동일 입력은 항상 동일 결과를 냅니다 (숨은 상태/시계 의존 없음).
    pub fn evaluate(&self, session: &Session, row: &Row) -> bool {
        match self {
            Clause::Open(open) => open.matches(row),
            Clause::Checked(checked) => checked.matches(session, row),
            Clause::Expr(source) => eval_cel_bool(source, session, row).unwrap_or(false),
            Clause::And(children) => children.iter().all(|c| c.evaluate(session, row)),
            Clause::Or(children) => children.iter().any(|c| c.evaluate(session, row)),
        }
    }

    /// 파라미터 바인딩된 필터 조각 생성
    ///
    /// SQL 레벨에서는 단락 평가가 없으므로 AND/OR 양쪽 피연산자를 모두
    /// 렌더링하고 괄호로 우선순위를 고정합니다. `Expr` 절은 필터로
    /// 변환할 수 없습니다.
    pub fn to_filter(&self, session: &Session, params: &mut Vec<Value>) -> Result<String> {
        match self {
            Clause::Open(open) => Ok(open.render(params)),
            Clause::Checked(checked) => checked.render(session, params),
            Clause::Expr(_) => Err(Error::Expression {
                message: "expression clause cannot be rendered as a storage filter".to_string(),
            }),
            Clause::And(children) => render_children(children, " AND ", session, params),
            Clause::Or(children) => render_children(children, " OR ", session, params),
        }
    }

    /// 선언 시점 검증: CEL 표현식이 컴파일되는지 확인
    ///
    /// 런타임 평가 중에는 실패할 수 없도록 컴파일 단계에서 걸러냅니다.
    pub fn validate(&self) -> Result<()> {
        match self {
            Clause::Expr(source) => {
                Program::compile(source).map_err(|e| Error::Expression {
                    message: format!("invalid CEL expression '{}': {}", source, e),
                })?;
                Ok(())
            }
            Clause::And(children) | Clause::Or(children) => {
                for child in children {
                    child.validate()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn render_children(
    children: &[Clause],
    joiner: &str,
    session: &Session,
    params: &mut Vec<Value>,
) -> Result<String> {
    let mut parts = Vec::with_capacity(children.len());
    for child in children {
        parts.push(format!("({})", child.to_filter(session, params)?));
    }
    Ok(parts.join(joiner))
}

impl OpenClause {
    fn matches(&self, row: &Row) -> bool {
        let Some(actual) = row.get(&self.column) else {
            return false;
        };
        compare_values(self.op, actual, &self.value)
    }

    fn render(&self, params: &mut Vec<Value>) -> String {
        params.push(self.value.clone());
        let placeholder = format!("${}", params.len());
        match self.op {
            CompareOp::In | CompareOp::NotIn => {
                format!("{} {}({})", self.column, self.op.sql(), placeholder)
            }
            _ => format!("{} {} {}", self.column, self.op.sql(), placeholder),
        }
    }
}

impl CheckedClause {
    fn matches(&self, session: &Session, row: &Row) -> bool {
        let Some(expected) = session.attr(self.attr) else {
            return false;
        };
        let Some(actual) = row.get(&self.column) else {
            return false;
        };
        values_equal(actual, &expected)
    }

    fn render(&self, session: &Session, params: &mut Vec<Value>) -> Result<String> {
        let value = session.attr(self.attr).ok_or_else(|| Error::AccessDenied {
            reason: format!(
                "session attribute '{}' required for condition evaluation",
                self.attr.as_str()
            ),
        })?;
        params.push(value);
        Ok(format!("{} = ${}", self.column, params.len()))
    }
}

/// 연산자별 값 비교
fn compare_values(op: CompareOp, actual: &Value, expected: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(actual, expected),
        CompareOp::Ne => !values_equal(actual, expected),
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            let Some(ordering) = compare_order(actual, expected) else {
                return false;
            };
            match op {
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Gte => ordering.is_ge(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Lte => ordering.is_le(),
                _ => unreachable!(),
            }
        }
        CompareOp::In => match expected {
            Value::Array(items) => items.iter().any(|item| values_equal(actual, item)),
            _ => false,
        },
        CompareOp::NotIn => match expected {
            Value::Array(items) => !items.iter().any(|item| values_equal(actual, item)),
            _ => false,
        },
        CompareOp::Like => match (actual, expected) {
            (Value::String(s), Value::String(pattern)) => like_match(s, pattern),
            _ => false,
        },
    }
}

/// 완화된 동등 비교
///
/// 세션 속성은 문자열로 운반되므로 숫자 PK와 비교할 때 문자열 표현을
/// 함께 비교합니다 (`42 == "42"`).
fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (scalar_repr(a), scalar_repr(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn scalar_repr(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn compare_order(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x.as_f64().and_then(|x| y.as_f64().map(|y| x.partial_cmp(&y)))?
        }
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// `%` 와일드카드만 지원하는 LIKE 매칭
///
/// 패턴을 `%` 기준 리터럴 조각으로 나눠 첫 조각은 접두사로, 마지막
/// 조각은 접미사로 고정하고 중간 조각들은 순서대로 탐색합니다.
/// `a%b` 같은 내부 와일드카드도 처리합니다. `_` 와일드카드는 미지원.
fn like_match(value: &str, pattern: &str) -> bool {
    let segments: Vec<&str> = pattern.split('%').collect();
    if segments.len() == 1 {
        return value == pattern;
    }

    let first = segments[0];
    let last = segments[segments.len() - 1];
    let Some(mut rest) = value.strip_prefix(first) else {
        return false;
    };

    for segment in &segments[1..segments.len() - 1] {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(at) => rest = &rest[at + segment.len()..],
            None => return false,
        }
    }

    rest.ends_with(last)
}

/// CEL 표현식 bool 평가
fn eval_cel_bool(source: &str, session: &Session, row: &Row) -> Result<bool> {
    let mut cel_ctx = Context::default();
    for (name, value) in session.to_cel_variables(Some(row)) {
        cel_ctx.add_variable_from_value(name, json_to_cel(value));
    }

    let program = Program::compile(source).map_err(|e| Error::Expression {
        message: e.to_string(),
    })?;

    let result = program.execute(&cel_ctx).map_err(|e| Error::Expression {
        message: e.to_string(),
    })?;

    match result {
        CelValue::Bool(b) => Ok(b),
        _ => Err(Error::Expression {
            message: "condition did not evaluate to bool".to_string(),
        }),
    }
}

fn json_to_cel(value: Value) -> CelValue {
    match value {
        Value::Null => CelValue::Null,
        Value::Bool(b) => CelValue::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                CelValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                CelValue::UInt(u)
            } else if let Some(f) = n.as_f64() {
                CelValue::Float(f)
            } else {
                CelValue::Null
            }
        }
        Value::String(s) => CelValue::String(s.into()),
        Value::Array(arr) => {
            let values = arr.into_iter().map(json_to_cel).collect::<Vec<_>>();
            CelValue::List(std::sync::Arc::new(values))
        }
        Value::Object(map) => {
            let mut obj = std::collections::HashMap::new();
            for (k, v) in map {
                obj.insert(cel_interpreter::objects::Key::from(k), json_to_cel(v));
            }
            CelValue::Map(cel_interpreter::objects::Map {
                map: std::sync::Arc::new(obj),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_checked_clause_owner_match() {
        let clause = Clause::checked("owner", SessionAttr::ActorId);
        let session = Session::actor("42", vec![]);

        assert!(clause.evaluate(&session, &row(json!({ "owner": 42 }))));
        assert!(!clause.evaluate(&session, &row(json!({ "owner": 7 }))));
        assert!(!clause.evaluate(&Session::anonymous(), &row(json!({ "owner": 42 }))));
    }

    #[test]
    fn test_compound_clause_scenario() {
        // (owner == actor_id & int1 >= 10) | int2 < 20
        let clause = Clause::checked("owner", SessionAttr::ActorId)
            .and(Clause::open("int1", CompareOp::Gte, json!(10)))
            .or(Clause::open("int2", CompareOp::Lt, json!(20)));

        let session = Session::actor("42", vec![]);
        let data = row(json!({ "owner": 42, "int1": 5, "int2": 15 }));

        // (true & false) | true = true
        assert!(clause.evaluate(&session, &data));

        let data = row(json!({ "owner": 42, "int1": 5, "int2": 25 }));
        assert!(!clause.evaluate(&session, &data));
    }

    #[test]
    fn test_composition_laws() {
        let c1 = Clause::open("a", CompareOp::Gte, json!(1));
        let c2 = Clause::checked("owner", SessionAttr::ActorId);
        let session = Session::actor("9", vec![]);

        let samples = [
            row(json!({ "a": 0, "owner": 9 })),
            row(json!({ "a": 2, "owner": 9 })),
            row(json!({ "a": 2, "owner": 1 })),
            row(json!({ "a": 0, "owner": 1 })),
        ];

        for data in &samples {
            let and = c1.clone().and(c2.clone()).evaluate(&session, data);
            let or = c1.clone().or(c2.clone()).evaluate(&session, data);
            assert_eq!(and, c1.evaluate(&session, data) && c2.evaluate(&session, data));
            assert_eq!(or, c1.evaluate(&session, data) || c2.evaluate(&session, data));
        }
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let clause = Clause::checked("owner", SessionAttr::ActorId)
            .and(Clause::open("count", CompareOp::Lte, json!(100)));
        let session = Session::actor("42", vec![]);
        let data = row(json!({ "owner": 42, "count": 50 }));

        let first = clause.evaluate(&session, &data);
        for _ in 0..10 {
            assert_eq!(clause.evaluate(&session, &data), first);
        }
    }

    #[test]
    fn test_filter_rendering() {
        let clause = Clause::checked("owner", SessionAttr::ActorId)
            .and(Clause::open("int1", CompareOp::Gte, json!(10)));
        let session = Session::actor("42", vec![]);

        let mut params = Vec::new();
        let fragment = clause.to_filter(&session, &mut params).unwrap();

        assert_eq!(fragment, "(owner = $1) AND (int1 >= $2)");
        assert_eq!(params, vec![json!("42"), json!(10)]);
    }

    #[test]
    fn test_filter_renders_both_or_operands() {
        // SQL 레벨에는 단락 평가가 없다: 양쪽 모두 렌더링되어야 한다
        let clause = Clause::open("a", CompareOp::Eq, json!(1))
            .or(Clause::open("b", CompareOp::Eq, json!(2)));

        let mut params = Vec::new();
        let fragment = clause.to_filter(&Session::anonymous(), &mut params).unwrap();

        assert_eq!(fragment, "(a = $1) OR (b = $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_expr_clause_not_filterable() {
        let clause = Clause::expr("request.auth.sub == 'x'");
        let mut params = Vec::new();
        assert!(clause.to_filter(&Session::anonymous(), &mut params).is_err());
    }

    #[test]
    fn test_expr_clause_evaluation() {
        let clause = Clause::expr("resource.int1 >= 10");
        let session = Session::actor("42", vec![]);

        assert!(clause.evaluate(&session, &row(json!({ "int1": 12 }))));
        assert!(!clause.evaluate(&session, &row(json!({ "int1": 5 }))));
    }

    #[test]
    fn test_expr_validation_rejects_garbage() {
        assert!(Clause::expr("resource.a >= 1").validate().is_ok());
        assert!(Clause::expr("not ( a ==").validate().is_err());
    }

    #[test]
    fn test_in_operator() {
        let clause = Clause::open("status", CompareOp::In, json!(["active", "pending"]));
        assert!(clause.evaluate(&Session::anonymous(), &row(json!({ "status": "active" }))));
        assert!(!clause.evaluate(&Session::anonymous(), &row(json!({ "status": "closed" }))));
    }

    #[test]
    fn test_like_operator_wildcards() {
        let anon = Session::anonymous();
        let check = |pattern: &str, name: &str| {
            Clause::open("name", CompareOp::Like, json!(pattern))
                .evaluate(&anon, &row(json!({ "name": name })))
        };

        assert!(check("clinic%", "clinic-seoul"));
        assert!(check("%seoul", "clinic-seoul"));
        assert!(check("%inic%", "clinic-seoul"));
        assert!(check("clinic", "clinic"));

        // 내부 와일드카드
        assert!(check("clinic%seoul", "clinic-north-seoul"));
        assert!(check("c%n%l", "clinic-seoul"));
        assert!(!check("clinic%busan", "clinic-seoul"));
        assert!(!check("a%bc%c", "abc"));
    }

    #[test]
    fn test_missing_column_denies() {
        let clause = Clause::open("missing", CompareOp::Eq, json!(1));
        assert!(!clause.evaluate(&Session::anonymous(), &row(json!({ "other": 1 }))));
    }
}
