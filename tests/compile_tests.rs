use tinypl::{CompileError, Comparison, Instruction, Listing, compile};

/// Execute a finalized listing the way the target stack machine would: the
/// program counter advances by instruction width, branches pop their two
/// operands and jump on the comparison, `return` ends the run. Returns the
/// final variable slots.
fn run(listing: &Listing) -> Vec<i32> {
  let mut stack: Vec<i32> = Vec::new();
  let mut vars = vec![0i32; 8];
  let mut pc = 0;
  let mut steps = 0;

  loop {
    steps += 1;
    assert!(steps < 100_000, "program did not terminate");

    let instruction = listing.get(pc).expect("pc must land on an instruction");
    match instruction {
      Instruction::Const(value) | Instruction::Bipush(value) | Instruction::Sipush(value) => {
        stack.push(*value);
      }
      Instruction::Load(slot) => stack.push(vars[*slot]),
      Instruction::Store(slot) => vars[*slot] = stack.pop().expect("stack underflow"),
      Instruction::Add => {
        let (lhs, rhs) = pop_pair(&mut stack);
        stack.push(lhs + rhs);
      }
      Instruction::Sub => {
        let (lhs, rhs) = pop_pair(&mut stack);
        stack.push(lhs - rhs);
      }
      Instruction::Mul => {
        let (lhs, rhs) = pop_pair(&mut stack);
        stack.push(lhs * rhs);
      }
      Instruction::Div => {
        let (lhs, rhs) = pop_pair(&mut stack);
        stack.push(lhs / rhs);
      }
      Instruction::Branch(cmp, Some(target)) => {
        let (lhs, rhs) = pop_pair(&mut stack);
        let taken = match cmp {
          Comparison::Le => lhs <= rhs,
          Comparison::Ge => lhs >= rhs,
          Comparison::Ne => lhs != rhs,
          Comparison::Eq => lhs == rhs,
        };
        if taken {
          pc = *target;
          continue;
        }
      }
      Instruction::Goto(Some(target)) => {
        pc = *target;
        continue;
      }
      Instruction::Branch(_, None) | Instruction::Goto(None) => panic!("unpatched jump at {pc}"),
      Instruction::Return => return vars,
    }
    pc += instruction.width();
  }
}

fn pop_pair(stack: &mut Vec<i32>) -> (i32, i32) {
  let rhs = stack.pop().expect("stack underflow");
  let lhs = stack.pop().expect("stack underflow");
  (lhs, rhs)
}

#[test]
fn straight_line_assignment_listing() {
  let listing = compile("int x; x = 5; end").unwrap();
  assert_eq!(listing.to_string(), "0: iconst_5\n1: istore_0\n2: return\n");
}

#[test]
fn if_without_else_falls_through_to_join() {
  let listing = compile("int x; if (x > 1) { x = 1; } end").unwrap();
  assert_eq!(
    listing.to_string(),
    "0: iload_0\n\
     1: iconst_1\n\
     2: if_icmple 7\n\
     5: iconst_1\n\
     6: istore_0\n\
     7: return\n"
  );
  // The branch skips the true branch, landing right after its store.
  assert_eq!(
    listing.get(2),
    Some(&Instruction::Branch(Comparison::Le, Some(7)))
  );
}

#[test]
fn if_else_branches_land_on_else_and_join() {
  let listing = compile("int x; if (x > 1) { x = 1; } else { x = 2; } end").unwrap();
  // Conditional branch lands on the else branch's first instruction.
  assert_eq!(
    listing.get(2),
    Some(&Instruction::Branch(Comparison::Le, Some(10)))
  );
  // The goto at the end of the true branch lands just past the else branch.
  assert_eq!(listing.get(7), Some(&Instruction::Goto(Some(12))));
  assert_eq!(listing.get(12), Some(&Instruction::Return));
}

#[test]
fn while_loop_retests_both_operands() {
  let listing = compile("int i, n; i = 0; n = 4; while (i < n) { i = i + 1; } end").unwrap();

  // The condition's operand loads sit at 4 and 5; the exit branch follows.
  assert_eq!(listing.get(4), Some(&Instruction::Load(0)));
  assert_eq!(listing.get(5), Some(&Instruction::Load(1)));
  assert_eq!(
    listing.get(6),
    Some(&Instruction::Branch(Comparison::Ge, Some(16)))
  );
  // The back-jump re-executes both loads, not just the comparison.
  assert_eq!(listing.get(13), Some(&Instruction::Goto(Some(4))));

  let vars = run(&listing);
  assert_eq!(vars[0], 4); // i counted up to n
  assert_eq!(vars[1], 4);
}

#[test]
fn wide_operands_keep_the_back_jump_aligned() {
  // The literal 100 takes a two-unit bipush, so a back-jump computed from
  // raw source positions (or a fixed operand count) would land mid-instruction.
  let listing = compile("int i; i = 0; while (i < 100) { i = i + 10; } end").unwrap();

  assert_eq!(listing.get(2), Some(&Instruction::Load(0)));
  assert_eq!(listing.get(3), Some(&Instruction::Bipush(100)));
  assert_eq!(
    listing.get(5),
    Some(&Instruction::Branch(Comparison::Ge, Some(16)))
  );
  assert_eq!(listing.get(13), Some(&Instruction::Goto(Some(2))));

  let vars = run(&listing);
  assert_eq!(vars[0], 100);
}

#[test]
fn undeclared_assignment_target_is_rejected() {
  let err = compile("int x; y = 1; end").unwrap_err();
  assert!(matches!(
    err,
    CompileError::UndeclaredIdentifier { name: 'y' }
  ));
}

#[test]
fn undeclared_operand_is_rejected() {
  let err = compile("int x; x = y + 1; end").unwrap_err();
  assert!(matches!(
    err,
    CompileError::UndeclaredIdentifier { name: 'y' }
  ));
}

#[test]
fn factorial_program_runs_to_completion() {
  let listing = compile(
    "int n, i, f;
     n = 4;
     i = 1;
     f = 1;
     while (i < n) {
       i = i + 1;
       f = f * i;
     }
     end",
  )
  .unwrap();

  let vars = run(&listing);
  assert_eq!(vars[0], 4); // n
  assert_eq!(vars[1], 4); // i
  assert_eq!(vars[2], 24); // f = 4!
}

#[test]
fn gcd_program_exercises_nested_branches() {
  let listing = compile(
    "int x, y;
     x = 121;
     y = 132;
     while (x != y) {
       if (x > y)
            { x = x - y; }
       else { y = y - x; }
     }
     end",
  )
  .unwrap();

  // 121 fits the byte encoding, 132 does not.
  let rendered = listing.to_string();
  assert!(rendered.contains("bipush 121"));
  assert!(rendered.contains("sipush 132"));

  let vars = run(&listing);
  assert_eq!(vars[0], 11); // gcd(121, 132)
  assert_eq!(vars[1], 11);
}

#[test]
fn parenthesised_expression_groups_first() {
  let listing = compile("int x; x = (1 + 2) * 3; end").unwrap();
  assert_eq!(
    listing.to_string(),
    "0: iconst_1\n\
     1: iconst_2\n\
     2: iadd\n\
     3: iconst_3\n\
     4: imul\n\
     5: istore_0\n\
     6: return\n"
  );

  let vars = run(&listing);
  assert_eq!(vars[0], 9);
}

#[test]
fn malformed_expression_is_a_diagnostic() {
  let err = compile("int x; x = ; end").unwrap_err();
  assert!(matches!(err, CompileError::WithLocation { .. }));
}

#[test]
fn missing_end_is_a_diagnostic() {
  assert!(compile("int x; x = 1;").is_err());
}
