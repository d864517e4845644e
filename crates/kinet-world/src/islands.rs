/// Union-find over solver indices. Only bodies that merge islands get unioned;
/// the rest stay singletons and are skipped by `groups`.
pub struct Islands {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl Islands {
    pub fn new(n: usize) -> Self {
        Self { parent: (0..n).collect(), rank: vec![0; n] }
    }

    pub fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb { return; }
        match self.rank[ra].cmp(&self.rank[rb]) {
            core::cmp::Ordering::Less => self.parent[ra] = rb,
            core::cmp::Ordering::Greater => self.parent[rb] = ra,
            core::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
    }

    /// Members of each island, restricted to `include`, in ascending index order.
    pub fn groups(&mut self, include: impl Fn(usize) -> bool) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut slot: Vec<Option<usize>> = vec![None; n];
        let mut out: Vec<Vec<usize>> = Vec::new();
        for i in 0..n {
            if !include(i) { continue; }
            let root = self.find(i);
            let k = *slot[root].get_or_insert_with(|| { out.push(Vec::new()); out.len() - 1 });
            out[k].push(i);
        }
        out
    }
}
