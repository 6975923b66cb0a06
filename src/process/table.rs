//! Fixed pid pool.
//!
//! The pool and the PCB array share an index, so resolving a pid is one
//! array access. Freeing a slot leaves the PCB contents as they were;
//! `allocate` only stamps the pid.

use super::pcb::Pcb;
use super::Pid;
use crate::config::MAX_TASK_NUM;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFull;

pub struct ProcessTable {
    pcbs: [Pcb; MAX_TASK_NUM],
    allocated: [bool; MAX_TASK_NUM],
}

impl ProcessTable {
    pub const fn new() -> Self {
        const EMPTY: Pcb = Pcb::empty();
        Self {
            pcbs: [EMPTY; MAX_TASK_NUM],
            allocated: [false; MAX_TASK_NUM],
        }
    }

    /// Claims the lowest free pid.
    pub fn allocate(&mut self) -> Result<Pid, TableFull> {
        let index = self
            .allocated
            .iter()
            .position(|used| !used)
            .ok_or(TableFull)?;
        self.allocated[index] = true;
        let pid = Pid::new(index);
        self.pcbs[index].pid = pid;
        Ok(pid)
    }

    pub fn free(&mut self, pid: Pid) {
        if let Some(used) = self.allocated.get_mut(pid.index()) {
            *used = false;
        }
    }

    pub fn is_allocated(&self, pid: Pid) -> bool {
        self.allocated.get(pid.index()).copied().unwrap_or(false)
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.is_allocated(pid).then(|| &self.pcbs[pid.index()])
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        if self.is_allocated(pid) {
            Some(&mut self.pcbs[pid.index()])
        } else {
            None
        }
    }

    pub fn live_count(&self) -> usize {
        self.allocated.iter().filter(|used| **used).count()
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcb_pid_matches_allocation() {
        let mut t = ProcessTable::new();
        let pids: std::vec::Vec<Pid> = (0..MAX_TASK_NUM).map(|_| t.allocate().unwrap()).collect();
        for (i, pid) in pids.iter().enumerate() {
            assert_eq!(pid.index(), i);
            assert_eq!(t.get(*pid).unwrap().pid, *pid);
        }
        assert_eq!(t.allocate(), Err(TableFull));
        assert_eq!(t.live_count(), MAX_TASK_NUM);
    }

    #[test]
    fn test_free_then_reuse_lowest() {
        let mut t = ProcessTable::new();
        let a = t.allocate().unwrap();
        let b = t.allocate().unwrap();
        t.get_mut(a).unwrap().terminal = 2;
        t.free(a);
        assert!(t.get(a).is_none());
        assert!(t.get(b).is_some());
        let c = t.allocate().unwrap();
        assert_eq!(c, a);
        // Contents survive a free; only the pid is stamped.
        assert_eq!(t.get(c).unwrap().terminal, 2);
    }

    #[test]
    fn test_out_of_range_pid() {
        let mut t = ProcessTable::new();
        assert!(t.get(Pid::new(MAX_TASK_NUM)).is_none());
        t.free(Pid::new(99));
        assert_eq!(t.live_count(), 0);
    }
}
