//! Point-to-point program generators.
//!
//! Each generator returns a ready-to-run [`Program`] whose sinks all feed
//! a single Proxy task named `"x"`. Start tasks are named `s<node>` and
//! live on their node.

use crate::error::{SimError, SimResult};
use crate::program::Program;
use crate::task::Task;
use crate::time::Time;

/// Name of the Proxy task every generated program ends with.
pub const END: &str = "x";

fn starts(prog: &mut Program, count: usize) {
    for node in 0..count {
        prog.add_node(Task::start(format!("s{}", node), node));
    }
}

fn put(name: String, src: usize, dst: usize, size: u64, blocking: bool) -> Task {
    let task = Task::put(name, src, dst, size);
    if blocking {
        task
    } else {
        task.non_blocking()
    }
}

/// Connect every task without successors to a new Proxy on `node`.
fn close(prog: &mut Program, node: usize) -> SimResult<()> {
    let sinks: Vec<String> = prog
        .tasks()
        .filter(|task| prog.out_degree(task.name()) == 0)
        .map(|task| task.name().to_string())
        .collect();
    prog.add_node(Task::proxy(END, node));
    for sink in sinks {
        prog.add_edge(&sink, END)?;
    }
    Ok(())
}

/// One message of `size` bytes from node 0 to node 1.
pub fn send(size: u64, blocking: bool) -> SimResult<Program> {
    let mut prog = Program::new();
    starts(&mut prog, 2);
    prog.add_node(put("p0".into(), 0, 1, size, blocking));
    prog.add_edge("s0", "p0")?;
    close(&mut prog, 1)?;
    Ok(prog)
}

/// Node 0 sends `size` bytes to each of nodes `1..width`, all at once.
pub fn multicast(size: u64, width: usize, blocking: bool) -> SimResult<Program> {
    if width < 2 {
        return Err(SimError::InvalidConfig(format!(
            "multicast needs at least two processes, got {}",
            width
        )));
    }

    let mut prog = Program::new();
    starts(&mut prog, width);
    for dst in 1..width {
        let name = format!("p0_{}", dst);
        prog.add_node(put(name.clone(), 0, dst, size, blocking));
        prog.add_edge("s0", &name)?;
    }
    close(&mut prog, 0)?;
    Ok(prog)
}

/// `rounds` blocking ping-pong exchanges of `size` bytes between nodes
/// 0 and 1.
///
/// Round `i` is the pair `p0_i` (ping) and `p1_i` (pong); each ping waits
/// for the previous pong and each pong for its ping.
pub fn pingpong(size: u64, rounds: usize) -> SimResult<Program> {
    if rounds == 0 {
        return Err(SimError::InvalidConfig("ping-pong needs at least one round".into()));
    }

    let mut prog = Program::new();
    starts(&mut prog, 2);

    for round in 0..rounds {
        let ping = format!("p0_{}", round);
        let pong = format!("p1_{}", round);
        prog.add_node(Task::put(ping.clone(), 0, 1, size));
        prog.add_node(Task::put(pong.clone(), 1, 0, size));

        if round == 0 {
            prog.add_edge("s0", &ping)?;
            prog.add_edge("s1", &pong)?;
        } else {
            let prev_ping = format!("p0_{}", round - 1);
            let prev_pong = format!("p1_{}", round - 1);
            prog.add_edge(&prev_ping, &ping)?;
            prog.add_edge(&prev_pong, &pong)?;
            prog.add_edge(&prev_pong, &ping)?;
        }
        prog.add_edge(&ping, &pong)?;
    }

    close(&mut prog, 0)?;
    Ok(prog)
}

/// Every node sleeps until the absolute time `until`.
pub fn sleep_until(nodes: usize, until: Time) -> SimResult<Program> {
    let mut prog = Program::new();
    starts(&mut prog, nodes);
    for node in 0..nodes {
        let name = format!("z{}", node);
        prog.add_node(Task::sleep_until(name.clone(), node, until));
        prog.add_edge(&format!("s{}", node), &name)?;
    }
    close(&mut prog, 0)?;
    Ok(prog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    fn sinks(prog: &Program) -> Vec<String> {
        prog.tasks()
            .filter(|t| prog.out_degree(t.name()) == 0)
            .map(|t| t.name().to_string())
            .collect()
    }

    #[test]
    fn test_send_shape() {
        let prog = send(64, false).unwrap();
        assert_eq!(prog.process_count(), 2);
        assert_eq!(sinks(&prog), vec![END.to_string()]);
        assert_eq!(prog.in_degree(END), 2);
        assert!(matches!(
            prog.get("p0").unwrap().kind(),
            TaskKind::Put { blocking: false, .. }
        ));
    }

    #[test]
    fn test_multicast_shape() {
        let prog = multicast(8, 4, true).unwrap();
        assert_eq!(prog.process_count(), 4);
        assert_eq!(prog.out_degree("s0"), 3);
        // three puts plus three idle starts
        assert_eq!(prog.in_degree(END), 6);
        assert!(multicast(8, 1, true).is_err());
    }

    #[test]
    fn test_pingpong_shape() {
        let prog = pingpong(0, 3).unwrap();
        assert_eq!(prog.len(), 2 + 6 + 1);
        assert_eq!(prog.in_degree("p1_0"), 2);
        assert_eq!(prog.in_degree("p0_2"), 2);
        assert_eq!(prog.in_degree("p1_2"), 2);
        assert_eq!(sinks(&prog), vec![END.to_string()]);
        assert_eq!(prog.predecessors(END).iter().next().unwrap(), "p1_2");
        assert!(pingpong(0, 0).is_err());
    }

    #[test]
    fn test_sleep_until_shape() {
        let prog = sleep_until(3, Time::new(50)).unwrap();
        assert_eq!(prog.process_count(), 3);
        assert_eq!(prog.in_degree(END), 3);
        assert!(prog.validate(3).is_ok());
    }
}
