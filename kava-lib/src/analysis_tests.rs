use lattice::dv::Dv;
use lattice::props::{
    Finality, Immutability, Independence, Modification, Nullness, PropertyKind, PropertyValue,
};

use super::analysis::AnalysisOptions;
use super::analysis::state::VariableId;
use super::analysis::value::Value;
use super::render::render_facts;
use super::sema::{ClassId, MethodId, ParamId, Unit};
use super::test_utils::{analyze_string, analyze_with};

fn class_id(unit: &Unit, class: &str) -> ClassId {
    unit.find_class(class).expect("class not found")
}

fn method_id(unit: &Unit, class: &str, method: &str) -> MethodId {
    unit.find_method(class_id(unit, class), method)
        .expect("method not found")
}

fn resolved(value: PropertyValue) -> Option<Dv<PropertyValue>> {
    Some(Dv::Resolved(value))
}

#[test]
fn test_constant_condition_and_unreachable_code() {
    let source = "class A {
  int f() {
    if (true) {
      return 1;
    }
    return 2;
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 3] warning condition-always-true: The condition always evaluates to true.\n\
         [line 6] warning unreachable-statement: This statement is never executed.\n"
    );
    assert!(!result.diagnostics.has_errors());

    let f = method_id(&unit, "A", "f");
    assert_eq!(result.registry.method(f).inlined, Some(Value::IntConst(1)));
    assert!(result.converged);
    assert_eq!(result.iterations, 2);
}

#[test]
fn test_empty_loops_are_reported_and_skipped() {
    let source = "class A {
  int f() {
    for (int x : []) {
      return 10;
    }
    while (false) {
      return 20;
    }
    return 0;
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 3] warning empty-loop: The loop is never entered; the collection is always empty.\n\
         [line 4] warning unreachable-statement: This statement is never executed.\n\
         [line 6] warning empty-loop: The loop is never entered; its condition is always false.\n\
         [line 7] warning unreachable-statement: This statement is never executed.\n"
    );

    // Returns inside the dead bodies do not leak into the method's value.
    let f = method_id(&unit, "A", "f");
    assert_eq!(result.registry.method(f).inlined, Some(Value::IntConst(0)));
    assert!(result.converged);
}

#[test]
fn test_identity_method_inlines_its_parameter() {
    let source = "class A {
  int same(int i) {
    int j = i;
    return j;
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(result.diagnostics.render(), "");
    let same = method_id(&unit, "A", "same");
    assert_eq!(
        result.registry.method(same).inlined,
        Some(Value::Variable(VariableId::Param(ParamId(0))))
    );
    assert!(result.converged);
}

#[test]
fn test_branch_merge_builds_conditional_value() {
    let source = "class A {
  int pick(bool flag) {
    int r = 0;
    if (flag) {
      r = 1;
    } else {
      r = 2;
    }
    return r;
  }
}
";
    let (unit, result) = analyze_string(source);

    // Both branches overwrite the initializer; neither assignment is
    // flagged as useless.
    assert_eq!(result.diagnostics.render(), "");

    let pick = method_id(&unit, "A", "pick");
    assert_eq!(
        result.registry.method(pick).inlined,
        Some(Value::Cond {
            cond: Box::new(Value::Variable(VariableId::Param(ParamId(0)))),
            then_val: Box::new(Value::IntConst(1)),
            else_val: Box::new(Value::IntConst(2)),
        })
    );
    assert!(result.converged);
}

#[test]
fn test_single_element_loop_folds_to_its_element() {
    let source = "class A {
  int f() {
    int result = 0;
    for (int x : [7]) {
      result = x;
    }
    return result;
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(result.diagnostics.render(), "");
    let f = method_id(&unit, "A", "f");
    assert_eq!(result.registry.method(f).inlined, Some(Value::IntConst(7)));
    assert!(result.converged);
}

#[test]
fn test_liveness_diagnostics() {
    let source = "class A {
  int f(list<int> xs) {
    int x = 1;
    xs = xs;
    return 10 / 0;
  }
}
";
    let (_, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 3] warning unused-variable: 'x' is never read.\n\
         [line 4] warning self-assignment: 'xs' is assigned to itself.\n\
         [line 5] error division-by-zero: The divisor is always zero.\n"
    );
    assert!(result.diagnostics.has_errors());
}

#[test]
fn test_overwritten_field_assignment() {
    let source = "class A {
  int x;
  constructor() {
    this.x = 1;
    this.x = 2;
  }
}
";
    let (_, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 4] warning useless-assignment: The value assigned to 'this.x' is overwritten \
         before it is read.\n"
    );
}

#[test]
fn test_immutable_class_facts() {
    let source = "class Point {
  int x;
  constructor(int a) {
    this.x = a;
  }
  int getX() {
    return this.x;
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(result.diagnostics.render(), "");
    assert!(result.converged);

    let point = class_id(&unit, "Point");
    let x = unit.find_field(point, "x").unwrap();
    let get_x = method_id(&unit, "Point", "getX");

    assert_eq!(
        result.registry.field(x).props.get(PropertyKind::Final).cloned(),
        resolved(PropertyValue::Finality(Finality::Final))
    );
    assert_eq!(
        result.registry.field(x).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::NotModified))
    );
    assert_eq!(
        result.registry.class(point).props.get(PropertyKind::Immutable).cloned(),
        resolved(PropertyValue::Immutability(Immutability::Recursive))
    );
    assert_eq!(
        result.registry.method(get_x).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::NotModified))
    );

    assert_eq!(
        render_facts(&unit, &result),
        "class Point: immutable = recursively-immutable
  field x: modified = not-modified, final = final
  method constructor: modified = modified, independent = not-involved
    param a: modified = not-modified, independent = not-involved
  method getX: modified = not-modified, independent = not-involved
"
    );
}

#[test]
fn test_mutable_class_facts() {
    let source = "class Counter {
  int value;
  void bump() {
    this.value = this.value + 1;
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(result.diagnostics.render(), "");
    assert!(result.converged);

    let counter = class_id(&unit, "Counter");
    let value = unit.find_field(counter, "value").unwrap();
    let bump = method_id(&unit, "Counter", "bump");

    assert_eq!(
        result.registry.field(value).props.get(PropertyKind::Final).cloned(),
        resolved(PropertyValue::Finality(Finality::Variable))
    );
    assert_eq!(
        result.registry.class(counter).props.get(PropertyKind::Immutable).cloned(),
        resolved(PropertyValue::Immutability(Immutability::Mutable))
    );
    assert_eq!(
        result.registry.method(bump).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::Modified))
    );
}

#[test]
fn test_null_receivers() {
    let source = "class A {
  int f() {
    list<int> xs = null;
    return xs.size();
  }
}
";
    let (_, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 4] warning missing-null-check: The receiver is always null here.\n"
    );
}

#[test]
fn test_nullable_parameter_contract() {
    let source = "class A {
  int measure(list<int> xs) {
    return xs.size();
  }
  int run() {
    return this.measure(null);
  }
}
";
    let (unit, result) = analyze_string(source);

    // The unconditional dereference both warns inside the method and
    // publishes a not-null contract that the call site violates.
    assert_eq!(
        result.diagnostics.render(),
        "[line 3] warning missing-null-check: 'xs' may be null when it is dereferenced.\n\
         [line 6] error precondition-violation: 'null' is passed for parameter 'xs', \
         which must not be null.\n"
    );
    assert!(result.diagnostics.has_errors());

    let measure = method_id(&unit, "A", "measure");
    let xs = unit.method(measure).params[0];
    assert_eq!(
        result.registry.param(xs).props.get(PropertyKind::NotNull).cloned(),
        resolved(PropertyValue::Nullness(Nullness::NotNull))
    );
}

#[test]
fn test_reassigned_parameter_has_no_null_contract() {
    let source = "class A {
  int f(list<int> xs) {
    xs = [1];
    return xs.size();
  }
  int run() {
    return this.f(null);
  }
}
";
    let (unit, result) = analyze_string(source);

    // The dereference narrows the reassigned content, not the incoming
    // value, so the null argument at the call site is fine.
    assert_eq!(result.diagnostics.render(), "");
    assert!(result.converged);

    let f = method_id(&unit, "A", "f");
    let xs = unit.method(f).params[0];
    assert_eq!(
        result.registry.param(xs).props.get(PropertyKind::NotNull).cloned(),
        resolved(PropertyValue::Nullness(Nullness::Nullable))
    );
}

#[test]
fn test_parameter_modification() {
    let source = "class A {
  void fill(list<int> xs) {
    xs.add(1);
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 3] warning missing-null-check: 'xs' may be null when it is dereferenced.\n"
    );

    let fill = method_id(&unit, "A", "fill");
    let xs = unit.method(fill).params[0];
    assert_eq!(
        result.registry.param(xs).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::Modified))
    );
    assert_eq!(
        result.registry.method(fill).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::NotModified))
    );
}

#[test]
fn test_reassignment_severs_stale_links() {
    let source = "class A {
  void swap(list<int> xs, list<int> ys) {
    list<int> zs = xs;
    zs = ys;
    zs.add(1);
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 3] warning useless-assignment: The value assigned to 'zs' is overwritten \
         before it is read.\n\
         [line 5] warning missing-null-check: 'zs' may be null when it is dereferenced.\n"
    );

    // The modification reaches only the currently linked parameter; the
    // link to the overwritten content is gone.
    let swap = method_id(&unit, "A", "swap");
    let xs = unit.method(swap).params[0];
    let ys = unit.method(swap).params[1];
    assert_eq!(
        result.registry.param(xs).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::NotModified))
    );
    assert_eq!(
        result.registry.param(ys).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::Modified))
    );
}

#[test]
fn test_stored_and_exposed_state_is_dependent() {
    let source = "class Holder {
  list<int> items;
  constructor(list<int> xs) {
    this.items = xs;
  }
  list<int> view() {
    return this.items;
  }
  int sizeUnchecked() {
    return this.items.size();
  }
  int sizeChecked() {
    if (this.items != null) {
      return this.items.size();
    }
    return 0;
  }
}
";
    let (unit, result) = analyze_string(source);

    // Only the unguarded dereference of the nullable field is flagged.
    assert_eq!(
        result.diagnostics.render(),
        "[line 10] warning missing-null-check: 'this.items' may be null when it is \
         dereferenced.\n"
    );
    assert!(result.converged);

    let holder = class_id(&unit, "Holder");
    let items = unit.find_field(holder, "items").unwrap();
    let view = method_id(&unit, "Holder", "view");
    let ctor = unit.constructors(holder).next().unwrap();
    let xs = unit.method(ctor).params[0];

    assert_eq!(
        result.registry.field(items).props.get(PropertyKind::Final).cloned(),
        resolved(PropertyValue::Finality(Finality::Final))
    );
    assert_eq!(
        result.registry.field(items).props.get(PropertyKind::NotNull).cloned(),
        resolved(PropertyValue::Nullness(Nullness::Nullable))
    );
    // The list field keeps the class off the recursive grade.
    assert_eq!(
        result.registry.class(holder).props.get(PropertyKind::Immutable).cloned(),
        resolved(PropertyValue::Immutability(Immutability::Effective))
    );
    assert_eq!(
        result.registry.method(view).props.get(PropertyKind::NotNull).cloned(),
        resolved(PropertyValue::Nullness(Nullness::Nullable))
    );
    assert_eq!(
        result.registry.method(view).props.get(PropertyKind::Independent).cloned(),
        resolved(PropertyValue::Independence(Independence::Dependent))
    );
    assert_eq!(
        result.registry.param(xs).props.get(PropertyKind::Independent).cloned(),
        resolved(PropertyValue::Independence(Independence::Dependent))
    );
}

fn eventual_source() -> &'static str {
    "class Account {
  bool sealed;
  int balance;
  void deposit(int amount) {
    if (this.sealed) {
      throw \"sealed\";
    }
    this.balance = this.balance + amount;
  }
  void seal() {
    if (this.sealed) {
      throw \"sealed\";
    }
    this.sealed = true;
  }
}
class Main {
  void freezeTwice(Account a) {
    a.seal();
    a.seal();
  }
  void useAfterFreeze(Account b) {
    b.seal();
    b.deposit(5);
  }
}
"
}

#[test]
fn test_eventual_immutability() {
    let (unit, result) = analyze_string(eventual_source());

    assert_eq!(
        result.diagnostics.render(),
        "[line 19] warning missing-null-check: 'a' may be null when it is dereferenced.\n\
         [line 20] error precondition-violation: 'a' was already marked; 'Account.seal' \
         requires 'sealed' to be unset.\n\
         [line 23] warning missing-null-check: 'b' may be null when it is dereferenced.\n\
         [line 24] error modifying-immutable: 'b' reached its immutable state; \
         'Account.deposit' may no longer be called on it.\n"
    );
    assert!(result.diagnostics.has_errors());
    assert!(result.converged);

    let account = class_id(&unit, "Account");
    let sealed = unit.find_field(account, "sealed").unwrap();
    let deposit = method_id(&unit, "Account", "deposit");
    let seal = method_id(&unit, "Account", "seal");

    assert_eq!(
        result.registry.class(account).props.get(PropertyKind::Immutable).cloned(),
        resolved(PropertyValue::Immutability(Immutability::EventualBefore))
    );
    assert_eq!(result.registry.class(account).eventual, Some(sealed));
    assert_eq!(result.registry.method(seal).marks, Some(sealed));
    assert_eq!(
        result.registry.method(seal).precondition.map(|p| p.field),
        Some(sealed)
    );
    assert_eq!(
        result.registry.method(deposit).precondition.map(|p| p.field),
        Some(sealed)
    );
    assert_eq!(result.registry.method(deposit).marks, None);

    let facts = render_facts(&unit, &result);
    assert!(facts.contains("eventually immutable once 'sealed' is set"));
    assert!(facts.contains("    precondition: 'sealed' is unset"));
    assert!(facts.contains("    marks: 'sealed'"));
}

#[test]
fn test_direct_recursion_resolves() {
    let source = "class A {
  int fact(int n) {
    if (n <= 1) {
      return 1;
    }
    return this.fact(n - 1) * n;
  }
}
";
    let (unit, result) = analyze_string(source);

    assert_eq!(result.diagnostics.render(), "");
    assert!(result.converged);
    assert_eq!(result.iterations, 2);

    let fact = method_id(&unit, "A", "fact");
    let analysis = result.registry.method(fact);
    assert_eq!(
        analysis.props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::NotModified))
    );
    // Direct recursion resolves to "no computable value"; call sites keep
    // the call symbolic.
    assert!(analysis.value_resolved);
    assert_eq!(analysis.returned, None);
    assert_eq!(analysis.inlined, None);
}

#[test]
fn test_mutual_recursion_reports_the_cycle() {
    let source = "class M {
  int f() {
    return this.g();
  }
  int g() {
    return this.f();
  }
}
";
    let (unit, result) = analyze_string(source);

    assert!(!result.converged);
    assert_eq!(result.iterations, 3);
    assert_eq!(
        result.diagnostics.render(),
        "[line 2] warning delayed-facts: The analysis could not resolve method M.f: value.\n\
         [line 5] warning delayed-facts: The analysis could not resolve method M.g: value.\n"
    );

    // The modification facts still settle: each method's delay is on the
    // other one and evaporates once the chain bottoms out.
    let f = method_id(&unit, "M", "f");
    let g = method_id(&unit, "M", "g");
    assert_eq!(
        result.registry.method(f).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::NotModified))
    );
    assert_eq!(
        result.registry.method(g).props.get(PropertyKind::Modified).cloned(),
        resolved(PropertyValue::Modification(Modification::NotModified))
    );
    assert!(!result.registry.method(f).value_resolved);
    assert!(!result.registry.method(g).value_resolved);
}

#[test]
fn test_infinite_loop_interrupts_the_flow() {
    let source = "class A {
  int f() {
    while (true) {
      continue;
    }
    return 1;
  }
}
";
    let (_, result) = analyze_string(source);

    assert_eq!(
        result.diagnostics.render(),
        "[line 6] warning unreachable-statement: This statement is never executed.\n"
    );
    assert!(result.converged);
}

#[test]
fn test_extra_iterations_change_nothing() {
    let (_, base) = analyze_string(eventual_source());
    let (_, wide) = analyze_with(
        eventual_source(),
        &AnalysisOptions { max_iterations: 40 },
    );

    assert_eq!(base.diagnostics.render(), wide.diagnostics.render());
    assert_eq!(base.iterations, wide.iterations);
    assert_eq!(base.converged, wide.converged);
}
