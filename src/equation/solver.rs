//! Local sparse systems and the reference Krylov solver.
//!
//! [`Equation::solve`](crate::equation::Equation::solve) reduces each rank's
//! rows to a [`CsrMatrix`] and hands it to a [`LinearSolver`]. Any sparse
//! solver can stand in; [`Gmres`] (restarted, left-preconditioned by the
//! Jacobi diagonal) is the one shipped with the crate.

/// `y = A x` for a square operator.
pub trait LinearOperator {
    fn dim(&self) -> usize;
    fn apply(&self, x: &[f64], y: &mut [f64]);
}

/// `y = M⁻¹ x`.
pub trait LeftPreconditioner {
    fn dim(&self) -> usize;
    fn apply_inv(&self, x: &[f64], y: &mut [f64]);
}

/// Compressed sparse rows, square.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CsrMatrix {
    pub row_ptr: Vec<usize>,
    pub cols: Vec<usize>,
    pub vals: Vec<f64>,
}

impl CsrMatrix {
    pub fn n_rows(&self) -> usize {
        self.row_ptr.len().saturating_sub(1)
    }

    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (a, b) = (self.row_ptr[i], self.row_ptr[i + 1]);
        self.cols[a..b].iter().copied().zip(self.vals[a..b].iter().copied())
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n_rows())
            .map(|i| self.row(i).filter(|&(j, _)| j == i).map(|(_, v)| v).sum())
            .collect()
    }
}

impl LinearOperator for CsrMatrix {
    fn dim(&self) -> usize {
        self.n_rows()
    }

    fn apply(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.row(i).map(|(j, v)| v * x[j]).sum();
        }
    }
}

/// Inverse diagonal; zero diagonal entries pass through unscaled.
#[derive(Clone, Debug)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    pub fn new(a: &CsrMatrix) -> Self {
        Self {
            inv_diag: a
                .diagonal()
                .into_iter()
                .map(|d| if d != 0.0 { 1.0 / d } else { 1.0 })
                .collect(),
        }
    }
}

impl LeftPreconditioner for JacobiPreconditioner {
    fn dim(&self) -> usize {
        self.inv_diag.len()
    }

    fn apply_inv(&self, x: &[f64], y: &mut [f64]) {
        for ((yi, xi), d) in y.iter_mut().zip(x).zip(&self.inv_diag) {
            *yi = xi * d;
        }
    }
}

/// Outcome of one local solve.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocalSolve {
    pub iterations: usize,
    /// `‖b − A x‖₂` after the solve.
    pub residual: f64,
    pub converged: bool,
}

/// A sparse solver for one rank's block.
pub trait LinearSolver {
    /// Solve `A x = b` from the incoming `x`. `tol` is the relative residual
    /// the caller needs; a solver may stop earlier only if it reaches it.
    fn solve(&self, a: &CsrMatrix, b: &[f64], x: &mut [f64], tol: f64) -> LocalSolve;
}

#[derive(Debug, Clone)]
pub struct GmresConfig {
    pub restart: usize,
    pub max_iters: usize,
    /// Relative tolerance on the preconditioned residual.
    pub tol: f64,
}

impl Default for GmresConfig {
    fn default() -> Self {
        Self {
            restart: 30,
            max_iters: 500,
            tol: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gmres {
    pub config: GmresConfig,
}

impl Gmres {
    pub fn new(config: GmresConfig) -> Self {
        Self { config }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

fn axpy(y: &mut [f64], a: f64, x: &[f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}

fn givens(a: f64, b: f64) -> (f64, f64) {
    if b == 0.0 {
        (1.0, 0.0)
    } else if a.abs() > b.abs() {
        let t = b / a;
        let c = 1.0 / (1.0 + t * t).sqrt();
        (c, c * t)
    } else {
        let t = a / b;
        let s = 1.0 / (1.0 + t * t).sqrt();
        (s * t, s)
    }
}

/// Restarted GMRES on `(M⁻¹ A) x = M⁻¹ b`, starting from the incoming `x`.
pub fn gmres_left_precond(
    op: &dyn LinearOperator,
    m_inv: &dyn LeftPreconditioner,
    b: &[f64],
    x: &mut [f64],
    cfg: &GmresConfig,
) -> LocalSolve {
    let n = op.dim();
    let mut ax = vec![0.0; n];
    let mut tmp = vec![0.0; n];
    let true_residual = |x: &[f64], ax: &mut [f64]| {
        op.apply(x, ax);
        b.iter().zip(ax.iter()).map(|(bi, ai)| (bi - ai).powi(2)).sum::<f64>().sqrt()
    };

    if n == 0 {
        return LocalSolve {
            iterations: 0,
            residual: 0.0,
            converged: true,
        };
    }

    m_inv.apply_inv(b, &mut tmp);
    let bnorm = norm(&tmp).max(1e-30);
    let mut r = vec![0.0; n];
    let mut iters = 0usize;
    let restart = cfg.restart.max(1);

    loop {
        op.apply(x, &mut ax);
        for i in 0..n {
            tmp[i] = b[i] - ax[i];
        }
        m_inv.apply_inv(&tmp, &mut r);
        let beta = norm(&r);
        if beta / bnorm <= cfg.tol || iters >= cfg.max_iters {
            return LocalSolve {
                iterations: iters,
                residual: true_residual(x, &mut ax),
                converged: beta / bnorm <= cfg.tol,
            };
        }

        let mut v: Vec<Vec<f64>> = Vec::with_capacity(restart + 1);
        let mut h = vec![vec![0.0; restart]; restart + 1];
        let (mut cs, mut sn) = (vec![0.0; restart], vec![0.0; restart]);
        let mut g = vec![0.0; restart + 1];
        v.push(r.iter().map(|ri| ri / beta).collect());
        g[0] = beta;

        let mut k_done = 0;
        for k in 0..restart {
            iters += 1;
            op.apply(&v[k], &mut ax);
            let mut w = vec![0.0; n];
            m_inv.apply_inv(&ax, &mut w);

            // modified Gram-Schmidt
            for j in 0..=k {
                h[j][k] = dot(&w, &v[j]);
                axpy(&mut w, -h[j][k], &v[j]);
            }
            h[k + 1][k] = norm(&w);
            if h[k + 1][k] != 0.0 {
                let s = 1.0 / h[k + 1][k];
                w.iter_mut().for_each(|wi| *wi *= s);
            }
            v.push(w);

            for j in 0..k {
                let t = cs[j] * h[j][k] + sn[j] * h[j + 1][k];
                h[j + 1][k] = -sn[j] * h[j][k] + cs[j] * h[j + 1][k];
                h[j][k] = t;
            }
            let (c, s) = givens(h[k][k], h[k + 1][k]);
            cs[k] = c;
            sn[k] = s;
            h[k][k] = c * h[k][k] + s * h[k + 1][k];
            h[k + 1][k] = 0.0;
            let t = c * g[k] + s * g[k + 1];
            g[k + 1] = -s * g[k] + c * g[k + 1];
            g[k] = t;

            k_done = k + 1;
            if g[k_done].abs() / bnorm <= cfg.tol || iters >= cfg.max_iters {
                break;
            }
        }

        let mut y = vec![0.0; k_done];
        for i in (0..k_done).rev() {
            let mut sum = g[i];
            for j in (i + 1)..k_done {
                sum -= h[i][j] * y[j];
            }
            y[i] = if h[i][i] != 0.0 { sum / h[i][i] } else { 0.0 };
        }
        for (j, yj) in y.iter().enumerate() {
            axpy(x, *yj, &v[j]);
        }
    }
}

impl LinearSolver for Gmres {
    fn solve(&self, a: &CsrMatrix, b: &[f64], x: &mut [f64], tol: f64) -> LocalSolve {
        let m = JacobiPreconditioner::new(a);
        let cfg = GmresConfig {
            tol: self.config.tol.min(tol),
            ..self.config.clone()
        };
        let out = gmres_left_precond(a, &m, b, x, &cfg);
        if !out.converged {
            log::warn!(
                "gmres: no convergence after {} iterations, residual {:.3e}",
                out.iterations,
                out.residual
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiagonal(n: usize) -> CsrMatrix {
        let mut m = CsrMatrix {
            row_ptr: vec![0],
            ..Default::default()
        };
        for i in 0..n {
            if i > 0 {
                m.cols.push(i - 1);
                m.vals.push(-1.0);
            }
            m.cols.push(i);
            m.vals.push(2.5);
            if i + 1 < n {
                m.cols.push(i + 1);
                m.vals.push(-1.0);
            }
            m.row_ptr.push(m.cols.len());
        }
        m
    }

    #[test]
    fn gmres_solves_diagonally_dominant_system() {
        let a = tridiagonal(40);
        let x_true: Vec<f64> = (0..40).map(|i| (i as f64 * 0.3).sin()).collect();
        let mut b = vec![0.0; 40];
        a.apply(&x_true, &mut b);
        let mut x = vec![0.0; 40];
        let out = Gmres::default().solve(&a, &b, &mut x, 1e-10);
        assert!(out.converged);
        for (xi, ti) in x.iter().zip(&x_true) {
            assert!((xi - ti).abs() < 1e-8);
        }
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let a = tridiagonal(50);
        let b = vec![1.0; 50];
        let mut x = vec![0.0; 50];
        let cfg = GmresConfig {
            restart: 2,
            max_iters: 2,
            tol: 1e-14,
        };
        let out = Gmres::new(cfg).solve(&a, &b, &mut x, 1e-14);
        assert!(!out.converged);
        assert!(out.residual > 0.0);
    }

    #[test]
    fn caller_tolerance_tightens_the_configured_one() {
        let a = tridiagonal(60);
        let b: Vec<f64> = (0..60).map(|i| 1.0 + (i as f64 * 0.7).cos()).collect();
        let loose = Gmres::new(GmresConfig {
            tol: 1e-4,
            ..Default::default()
        });

        let mut x_loose = vec![0.0; 60];
        let coarse = loose.solve(&a, &b, &mut x_loose, 1.0);
        let mut x_tight = vec![0.0; 60];
        let fine = loose.solve(&a, &b, &mut x_tight, 1e-13);

        assert!(coarse.converged && fine.converged);
        let b_norm = b.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert!(fine.residual < 1e-10 * b_norm);
        assert!(fine.residual < coarse.residual);
    }
}
