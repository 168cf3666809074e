use scalargrad::Tape;

fn main() {
  // Create a tape (the arena every node of the graph is stored on)
  let mut tape = Tape::default();
  // Build a single tanh neuron inside a scope
  tape.scope(|guard| {
    let x1 = guard.var(2.0);
    let x2 = guard.var(0.0);
    let w1 = guard.var(-3.0);
    let w2 = guard.var(1.0);
    let b = guard.var(6.881_373_587_019_543);
    let n = &x1 * &w1 + &x2 * &w2 + &b;
    let o = n.tanh();
    o.backward();
    println!("{o}");
    for (name, var) in [("x1", x1), ("x2", x2), ("w1", w1), ("w2", w2)] {
      println!("do/d{name}: {}", var.grad());
    }
  });
}
